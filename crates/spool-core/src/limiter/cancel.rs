use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{LimitStatus, Limiter};
use crate::domain::ConsumerState;

/// Handle that asks a consumer to stop after its current message.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Limiter observing this handle.
    pub fn limiter(&self) -> CancellationLimiter {
        CancellationLimiter {
            handle: self.clone(),
        }
    }
}

/// Stops once its `CancelHandle` has been triggered (e.g. from a signal handler).
#[derive(Debug, Clone)]
pub struct CancellationLimiter {
    handle: CancelHandle,
}

impl Limiter for CancellationLimiter {
    fn evaluate(&self, _state: &ConsumerState) -> LimitStatus {
        if self.handle.is_cancelled() {
            return LimitStatus::reached("Consumer cancelled");
        }
        LimitStatus::Continue
    }
}
