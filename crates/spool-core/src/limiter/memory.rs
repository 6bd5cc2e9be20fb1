use super::{LimitStatus, Limiter};
use crate::domain::ConsumerState;

/// Stops once sampled resident memory exceeds `max_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLimiter {
    max_bytes: u64,
}

impl MemoryLimiter {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn from_megabytes(megabytes: u64) -> Self {
        Self::new(megabytes.saturating_mul(1024 * 1024))
    }
}

impl Limiter for MemoryLimiter {
    fn evaluate(&self, state: &ConsumerState) -> LimitStatus {
        if self.max_bytes > 0 && state.memory_bytes() > self.max_bytes {
            return LimitStatus::reached(format!(
                "Memory peak of {}MB reached",
                self.max_bytes / 1024 / 1024
            ));
        }
        LimitStatus::Continue
    }
}
