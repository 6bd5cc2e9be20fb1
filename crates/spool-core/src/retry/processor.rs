//! RetryProcessor: bounded requeue-on-failure around a base processor.

use std::sync::Arc;

use async_trait::async_trait;

use super::RetryStrategy;
use crate::domain::{Message, ProcessOutcome, RetryDecision, SpoolError};
use crate::ports::Processor;

/// Decorates a processor with bounded retries.
///
/// On `Failure`, a message on attempt `a` is republished as `a + 1` while
/// `a + 1 < max_attempts`; the outcome becomes `Retried` and the consumer acks
/// the original delivery. Once the budget is used up the failure passes
/// through unchanged. Success and faults of the inner processor are untouched.
pub struct RetryProcessor {
    inner: Arc<dyn Processor>,
    strategy: Arc<dyn RetryStrategy>,
    max_attempts: u32,
}

impl RetryProcessor {
    pub fn new(inner: Arc<dyn Processor>, strategy: Arc<dyn RetryStrategy>, max_attempts: u32) -> Self {
        Self {
            inner,
            strategy,
            max_attempts,
        }
    }

    pub fn decide(&self, message: &Message) -> RetryDecision {
        RetryDecision::for_attempt(message.attempt(), self.max_attempts)
    }
}

#[async_trait]
impl Processor for RetryProcessor {
    async fn process(&self, message: &Message) -> Result<ProcessOutcome, SpoolError> {
        let reason = match self.inner.process(message).await? {
            ProcessOutcome::Failure { reason } => reason,
            other => return Ok(other),
        };

        match self.decide(message) {
            RetryDecision::Requeue { attempt } => {
                let params = self.strategy.retry(message, attempt).await?;
                tracing::info!(
                    delivery_tag = %message.tag_label(),
                    message_id = %message.id(),
                    attempt,
                    max_attempts = self.max_attempts,
                    delay = ?params.delay,
                    priority = ?params.priority,
                    %reason,
                    "requeued failed message for retry"
                );
                Ok(ProcessOutcome::Retried { attempt })
            }
            RetryDecision::GiveUp { attempts } => {
                tracing::warn!(
                    delivery_tag = %message.tag_label(),
                    message_id = %message.id(),
                    attempts,
                    %reason,
                    "retry attempts exhausted, giving up"
                );
                Ok(ProcessOutcome::Failure { reason })
            }
        }
    }
}
