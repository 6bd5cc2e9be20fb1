//! Limiters: rules that end consumption once a threshold is crossed.
//!
//! The consumer evaluates limiters after each processed message, in
//! registration order. The first one that reports `Reached` wins; the rest are
//! skipped. A threshold of zero disables a limiter.

mod cancel;
mod memory;
mod messages;
mod time;

pub use cancel::{CancelHandle, CancellationLimiter};
pub use memory::MemoryLimiter;
pub use messages::MessagesLimiter;
pub use time::TimeLimiter;

use crate::domain::ConsumerState;

/// Result of a limiter check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitStatus {
    Continue,
    Reached { reason: String },
}

impl LimitStatus {
    pub fn reached(reason: impl Into<String>) -> Self {
        Self::Reached {
            reason: reason.into(),
        }
    }

    pub fn is_reached(&self) -> bool {
        matches!(self, Self::Reached { .. })
    }
}

/// A stop rule. Reads the consumer state, never mutates it.
pub trait Limiter: Send + Sync {
    fn evaluate(&self, state: &ConsumerState) -> LimitStatus;
}

/// Ordered limiter set with short-circuit evaluation.
#[derive(Default)]
pub struct LimiterSet {
    limiters: Vec<Box<dyn Limiter>>,
}

impl LimiterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, limiter: Box<dyn Limiter>) {
        self.limiters.push(limiter);
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Reason of the first limiter that is reached, if any.
    pub fn first_reached(&self, state: &ConsumerState) -> Option<String> {
        self.limiters
            .iter()
            .find_map(|limiter| match limiter.evaluate(state) {
                LimitStatus::Reached { reason } => Some(reason),
                LimitStatus::Continue => None,
            })
    }
}
