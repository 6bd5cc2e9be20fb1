//! Message - queue から取り出す 1 単位の仕事。
//!
//! payload は opaque bytes のまま運ぶ（decode は Processor の責務）。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ids::{DeliveryTag, MessageId};

/// Highest priority a message can carry (AMQP-style 0..=9).
pub const MAX_PRIORITY: u8 = 9;

/// Priority of freshly published messages.
///
/// Sits above zero so a deprioritized retry copy can drop below fresh work.
pub const DEFAULT_PRIORITY: u8 = 4;

/// One unit of queued work.
///
/// A message built by a publisher has no delivery tag; the queue assigns one
/// when it hands the message to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    body: Vec<u8>,
    delivery_tag: Option<DeliveryTag>,

    /// How many times this logical unit of work has been retried.
    attempt: u32,

    priority: u8,

    /// Requested delay before the broker delivers this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay: Option<Duration>,

    #[serde(default)]
    redelivered: bool,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: MessageId::new(),
            body: body.into(),
            delivery_tag: None,
            attempt: 0,
            priority: DEFAULT_PRIORITY,
            delay: None,
            redelivered: false,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(MAX_PRIORITY);
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn delivery_tag(&self) -> Option<DeliveryTag> {
        self.delivery_tag
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    pub fn is_redelivered(&self) -> bool {
        self.redelivered
    }

    /// Delivery tag rendered for log lines (`-` when not delivered yet).
    pub fn tag_label(&self) -> String {
        self.delivery_tag
            .map(|tag| tag.to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    /// Stamp the message as delivered. Called by queue implementations.
    pub fn delivered(mut self, tag: DeliveryTag, redelivered: bool) -> Self {
        self.delivery_tag = Some(tag);
        self.redelivered = redelivered;
        self
    }

    /// Copy for republishing as the next attempt.
    ///
    /// The copy keeps the logical id and payload, drops the delivery tag, and
    /// takes the given attempt / delay / priority.
    pub fn next_attempt(&self, attempt: u32, delay: Option<Duration>, priority: u8) -> Self {
        Self {
            id: self.id,
            body: self.body.clone(),
            delivery_tag: None,
            attempt,
            priority: priority.min(MAX_PRIORITY),
            delay,
            redelivered: false,
        }
    }
}
