//! Backoff strategy: requeue with a growing delay.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Republisher, RetryStrategy};
use crate::domain::{ConfigError, Message, RequeueParameters};

/// Delay growth for the backoff strategy.
///
/// delay = base_delay * multiplier^(attempt - 1), capped at `max_delay`.
///
/// Example with the defaults (600s, 2.0, 24h):
/// - attempt 1: 10m
/// - attempt 2: 20m
/// - attempt 3: 40m
/// - ...
/// - attempt 9 and later: 24h
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    #[serde(rename = "base_delay_secs", deserialize_with = "secs::deserialize")]
    pub base_delay: Duration,

    pub multiplier: f64,

    #[serde(rename = "max_delay_secs", deserialize_with = "secs::deserialize")]
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(600),
            multiplier: 2.0,
            max_delay: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// A multiplier below 1.0 would shrink delays across attempts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoffMultiplier(self.multiplier.to_string()));
        }
        Ok(())
    }

    /// Delay before `attempt` (1-indexed; 0 is treated as 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Republishes to the same destination after a growing delay.
pub struct BackoffStrategy {
    republisher: Republisher,
    policy: BackoffPolicy,
}

impl BackoffStrategy {
    pub fn new(republisher: Republisher, policy: BackoffPolicy) -> Self {
        Self {
            republisher,
            policy,
        }
    }
}

#[async_trait]
impl RetryStrategy for BackoffStrategy {
    fn compute_requeue(&self, _message: &Message, attempt: u32) -> RequeueParameters {
        RequeueParameters::delayed(self.policy.delay_for(attempt))
    }

    fn republisher(&self) -> &Republisher {
        &self.republisher
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::testing::RecordingPublisher;
    use std::sync::Arc;

    #[test]
    fn default_policy_values() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(600));
        assert_eq!(policy.multiplier, 2.0);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn exponential_backoff_increases_until_cap() {
        let policy = BackoffPolicy::new(Duration::from_secs(2), 2.0, Duration::from_secs(20));

        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(20));
        assert_eq!(policy.delay_for(500), Duration::from_secs(20));
    }

    #[test]
    fn delays_never_decrease() {
        let policy = BackoffPolicy::default();
        let delays: Vec<Duration> = (0..64).map(|attempt| policy.delay_for(attempt)).collect();
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn shrinking_multiplier_is_rejected() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), 0.5, Duration::from_secs(10));
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidBackoffMultiplier(_))
        ));
    }

    #[test]
    fn deserializes_from_seconds() {
        let policy: BackoffPolicy =
            serde_json::from_str(r#"{"base_delay_secs": 30, "multiplier": 3.0}"#).unwrap();
        assert_eq!(policy.base_delay, Duration::from_secs(30));
        assert_eq!(policy.multiplier, 3.0);
        assert_eq!(policy.max_delay, BackoffPolicy::default().max_delay);
    }

    #[test]
    fn keeps_priority_and_sets_delay() {
        let strategy = BackoffStrategy::new(
            Republisher::new(Arc::new(RecordingPublisher::default())),
            BackoffPolicy::new(Duration::from_secs(5), 2.0, Duration::from_secs(60)),
        );
        let message = Message::new("x").with_priority(4);

        let params = strategy.compute_requeue(&message, 2);
        assert_eq!(params.delay, Some(Duration::from_secs(10)));
        assert_eq!(params.priority, None);
    }
}
