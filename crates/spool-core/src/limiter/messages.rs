use super::{LimitStatus, Limiter};
use crate::domain::ConsumerState;

/// Stops once `max` messages have been processed.
#[derive(Debug, Clone, Copy)]
pub struct MessagesLimiter {
    max: u64,
}

impl MessagesLimiter {
    pub fn new(max: u64) -> Self {
        Self { max }
    }
}

impl Limiter for MessagesLimiter {
    fn evaluate(&self, state: &ConsumerState) -> LimitStatus {
        if self.max > 0 && state.processed() >= self.max {
            return LimitStatus::reached(format!(
                "Maximum number of messages consumed ({})",
                self.max
            ));
        }
        LimitStatus::Continue
    }
}
