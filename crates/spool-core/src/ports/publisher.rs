//! Publisher port - retry のための再 publish

use async_trait::async_trait;

use crate::domain::{Message, SpoolError};

/// Publishes messages to a destination.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Build a fresh message for `payload` (attempt 0, default priority).
    fn create_message(&self, payload: Vec<u8>) -> Message {
        Message::new(payload)
    }

    /// Publish `message`. `destination` of `None` means the publisher's own
    /// default destination.
    ///
    /// Returns `Ok(false)` when the broker refused the message.
    async fn publish(&self, message: Message, destination: Option<&str>) -> Result<bool, SpoolError>;
}
