//! Identifiers used by the consumer runtime.
//!
//! - `MessageId`: 論理メッセージの ID（ULID）。retry で再 publish されても変わらない
//! - `DeliveryTag`: broker が配送ごとに振る番号。ack / nack はこれで指定する
//! - `ConsumerTag`: consumer インスタンスの購読を識別する（cancel で使う）

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Logical identity of a unit of work.
///
/// Stays the same across retries, so log lines for every attempt of a message
/// can be correlated.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Ulid);

impl MessageId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Broker-assigned identifier of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryTag(u64);

impl DeliveryTag {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription identifier of a consumer instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerTag(String);

impl ConsumerTag {
    /// Generate a unique tag: `<prefix>-<ulid>`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, Ulid::new().to_string().to_lowercase()))
    }

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
