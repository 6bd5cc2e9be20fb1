//! Retry: requeue failed messages through a pluggable strategy.
//!
//! - `RetryProcessor` decorates a processor and decides requeue vs. give up.
//! - `RetryStrategy` computes how the copy is requeued and publishes it.
//!   - `BackoffStrategy`: growing delay, same priority.
//!   - `DeprioritizeStrategy`: no delay, lower priority.

mod backoff;
mod deprioritize;
mod processor;

pub use backoff::{BackoffPolicy, BackoffStrategy};
pub use deprioritize::DeprioritizeStrategy;
pub use processor::RetryProcessor;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ConfigError, Message, RequeueParameters, SpoolError};
use crate::ports::Publisher;

/// Publisher bound to a retry destination.
///
/// `destination` of `None` republishes to the publisher's default destination,
/// which is the queue the failing consumer reads from.
#[derive(Clone)]
pub struct Republisher {
    publisher: Arc<dyn Publisher>,
    destination: Option<String>,
}

impl Republisher {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            destination: None,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    async fn publish(&self, message: Message) -> Result<bool, SpoolError> {
        self.publisher.publish(message, self.destination()).await
    }
}

/// Policy for requeueing a failed message.
#[async_trait]
pub trait RetryStrategy: Send + Sync {
    /// Delay / priority for the copy that becomes `attempt`.
    fn compute_requeue(&self, message: &Message, attempt: u32) -> RequeueParameters;

    fn republisher(&self) -> &Republisher;

    /// Publish a copy of `message` as `attempt`.
    ///
    /// Returns the parameters used. A refused publish is an error, since the
    /// original delivery is acked right after.
    async fn retry(&self, message: &Message, attempt: u32) -> Result<RequeueParameters, SpoolError> {
        let params = self.compute_requeue(message, attempt);
        let copy = message.next_attempt(
            attempt,
            params.delay,
            params.priority.unwrap_or(message.priority()),
        );

        if !self.republisher().publish(copy).await? {
            return Err(SpoolError::RequeueRejected {
                message_id: message.id().to_string(),
                attempt,
            });
        }
        Ok(params)
    }
}

/// Retry strategy names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetryStrategyType {
    #[default]
    Backoff,
    Deprioritize,
}

impl RetryStrategyType {
    pub fn as_str(self) -> &'static str {
        match self {
            RetryStrategyType::Backoff => "backoff",
            RetryStrategyType::Deprioritize => "deprioritize",
        }
    }

    /// Build the strategy publishing through `republisher`.
    pub fn build(self, republisher: Republisher, policy: BackoffPolicy) -> Arc<dyn RetryStrategy> {
        match self {
            RetryStrategyType::Backoff => Arc::new(BackoffStrategy::new(republisher, policy)),
            RetryStrategyType::Deprioritize => Arc::new(DeprioritizeStrategy::new(republisher)),
        }
    }
}

impl FromStr for RetryStrategyType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backoff" => Ok(RetryStrategyType::Backoff),
            "deprioritize" => Ok(RetryStrategyType::Deprioritize),
            _ => Err(ConfigError::UnsupportedRetryStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for RetryStrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingPublisher;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("backoff", RetryStrategyType::Backoff)]
    #[case("deprioritize", RetryStrategyType::Deprioritize)]
    #[case(" Backoff ", RetryStrategyType::Backoff)]
    fn parses_strategy_names(#[case] name: &str, #[case] expected: RetryStrategyType) {
        assert_eq!(name.parse::<RetryStrategyType>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = "linear".parse::<RetryStrategyType>().unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedRetryStrategy("linear".into()));
    }

    #[tokio::test]
    async fn retry_publishes_copy_to_configured_destination() {
        let publisher = Arc::new(RecordingPublisher::default());
        let republisher = Republisher::new(publisher.clone()).with_destination("orders.retry");
        let strategy = RetryStrategyType::Deprioritize.build(republisher, BackoffPolicy::default());

        let message = Message::new("order-1").with_priority(3);
        strategy.retry(&message, 1).await.unwrap();

        let published = publisher.published.lock().await;
        assert_eq!(published.len(), 1);
        let (copy, destination) = &published[0];
        assert_eq!(destination.as_deref(), Some("orders.retry"));
        assert_eq!(copy.attempt(), 1);
        assert_eq!(copy.priority(), 2);
        assert_eq!(copy.id(), message.id());
    }

    #[tokio::test]
    async fn refused_publish_is_an_error() {
        let publisher = Arc::new(RecordingPublisher::refusing());
        let strategy = RetryStrategyType::Backoff
            .build(Republisher::new(publisher), BackoffPolicy::default());

        let err = strategy.retry(&Message::new("x"), 1).await.unwrap_err();
        assert!(matches!(err, SpoolError::RequeueRejected { attempt: 1, .. }));
    }
}
