//! Queue port - メッセージの取り出しと ack / nack
//!
//! broker のプロトコル実装はこの trait の外側に置く。

use async_trait::async_trait;

use crate::domain::{ConsumerTag, Message, SpoolError};

/// A source of messages.
///
/// Contract:
/// - `fetch()` does not block indefinitely: it returns `Ok(None)` when nothing
///   is ready, and the consumer decides how long to wait.
/// - A fetched message must be acked or nacked before the next `fetch()` on
///   the same consumer.
/// - Mutual exclusion between consumers is the implementation's job.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Name of the queue (also the default retry destination).
    fn name(&self) -> &str;

    /// Take the next ready message, if any.
    async fn fetch(&self) -> Result<Option<Message>, SpoolError>;

    /// Mark a delivery as done.
    async fn ack(&self, message: &Message) -> Result<(), SpoolError>;

    /// Reject a delivery. With `requeue` the broker delivers it again,
    /// without it the message is dead-lettered.
    async fn nack(&self, message: &Message, requeue: bool) -> Result<(), SpoolError>;

    /// Cancel the subscription of `consumer_tag`. No more fetches follow.
    async fn cancel(&self, consumer_tag: &ConsumerTag) -> Result<(), SpoolError>;
}
