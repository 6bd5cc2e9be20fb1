//! ConsumerConfig - consumer の設定
//!
//! 全フィールドに default があり、JSON の一部だけを指定して読み込める。
//! 検証は `ConsumerBuilder::build()` 時に行う（ループ中には失敗しない）。

use std::time::Duration;

use serde::Deserialize;

use crate::domain::ConfigError;
use crate::retry::{BackoffPolicy, RetryStrategyType};

/// Options recognised by the consumer.
///
/// Zero disables `limit`, `max_memory` and `max_time`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerConfig {
    /// Messages per batch flush.
    pub batch_size: usize,

    /// Maximum number of messages to process.
    pub limit: u64,

    /// Resident memory ceiling, in bytes.
    pub max_memory: u64,

    /// Maximum run time, in seconds.
    pub max_time: u64,

    /// Sleep when the queue is empty, in milliseconds.
    pub wait_interval_ms: u64,

    /// Sleep after each processed message, in milliseconds.
    pub cool_down_ms: u64,

    /// Seconds the consumer must stay alive, however little work there is.
    pub min_runtime: u64,

    /// Total tries per message; 2 or more installs the retry decorator.
    pub max_attempts: u32,

    /// `backoff` or `deprioritize`.
    pub retry_strategy: String,

    /// Where retried copies go. Defaults to the consumed queue.
    pub retry_destination: Option<String>,

    /// Nack (dead-letter) failed messages instead of acking them.
    pub reject_failed: bool,

    pub backoff: BackoffPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            limit: 0,
            max_memory: 0,
            max_time: 0,
            wait_interval_ms: 100,
            cool_down_ms: 0,
            min_runtime: 15,
            max_attempts: 1,
            retry_strategy: RetryStrategyType::default().to_string(),
            retry_destination: None,
            reject_failed: false,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }

    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }

    pub fn min_runtime(&self) -> Duration {
        Duration::from_secs(self.min_runtime)
    }

    pub fn retries_enabled(&self) -> bool {
        self.max_attempts >= 2
    }

    /// Check the options and resolve the retry strategy.
    pub fn validate(&self) -> Result<RetryStrategyType, ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
        }
        let strategy: RetryStrategyType = self.retry_strategy.parse()?;
        if strategy == RetryStrategyType::Backoff {
            self.backoff.validate()?;
        }
        Ok(strategy)
    }
}
