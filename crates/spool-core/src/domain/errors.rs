//! Errors - 実行時の fault と構築時の設定エラー
//!
//! - `SpoolError`: consumer を止める想定外の fault（processor / queue / flusher / publisher）
//! - `ConfigError`: 構築時に検出する設定ミス（fail-fast、ループ中には発生しない）
//!
//! Limit 到達や業務上の失敗はエラーではない（`StopReason` / `ProcessOutcome` で表す）。

use thiserror::Error;

use super::ids::DeliveryTag;

/// Boxed error for faults raised by user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unexpected fault. Fatal to the current run.
#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("queue '{queue}' failed: {message}")]
    Queue { queue: String, message: String },

    #[error("processor fault on delivery {tag}: {source}")]
    Processor {
        tag: String,
        #[source]
        source: BoxError,
    },

    #[error("flusher '{flusher}' failed: {source}")]
    Flush {
        flusher: String,
        #[source]
        source: BoxError,
    },

    #[error("publisher failed: {0}")]
    Publish(String),

    #[error("requeue of message {message_id} (attempt {attempt}) was rejected by the publisher")]
    RequeueRejected { message_id: String, attempt: u32 },

    #[error("unknown delivery tag {0}")]
    UnknownDelivery(DeliveryTag),

    #[error("message has no delivery tag; only fetched messages can be acked or nacked")]
    NotDelivered,

    #[error("consume() was already called on this consumer")]
    AlreadyConsumed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SpoolError {
    pub fn queue(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Queue {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Wrap a fault raised while processing a delivery.
    pub fn processor(tag: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Processor {
            tag: tag.into(),
            source: source.into(),
        }
    }

    pub fn flush(flusher: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Flush {
            flusher: flusher.into(),
            source: source.into(),
        }
    }
}

/// Construction-time configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unsupported retry strategy: \"{0}\"")]
    UnsupportedRetryStrategy(String),

    #[error("batch size must be positive, got {0}")]
    InvalidBatchSize(usize),

    #[error("max attempts must be positive, got {0}")]
    InvalidMaxAttempts(u32),

    #[error("backoff multiplier must be at least 1.0, got {0}")]
    InvalidBackoffMultiplier(String),

    #[error("retrying with {0} attempts requires a publisher")]
    MissingPublisher(u32),

    #[error("invalid consumer configuration: {0}")]
    Parse(String),
}
