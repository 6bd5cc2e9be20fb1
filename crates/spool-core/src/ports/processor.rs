//! Processor port - メッセージごとの業務ロジック

use async_trait::async_trait;

use crate::domain::{Message, ProcessOutcome, SpoolError};

/// Business logic invoked once per message.
///
/// - Expected failures are returned as `Ok(ProcessOutcome::Failure { .. })`.
/// - `Err(SpoolError)` is an unexpected fault: the consumer shuts down and
///   hands the error to its caller. A panic is handled the same way.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, message: &Message) -> Result<ProcessOutcome, SpoolError>;
}
