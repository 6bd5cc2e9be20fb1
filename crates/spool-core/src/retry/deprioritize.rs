//! Deprioritize strategy: requeue right away, one priority step lower.

use async_trait::async_trait;

use super::{Republisher, RetryStrategy};
use crate::domain::{Message, RequeueParameters};

/// Retried messages yield to fresh ones instead of waiting.
///
/// Fresh messages start at `DEFAULT_PRIORITY`; a copy already at 0 stays at 0.
pub struct DeprioritizeStrategy {
    republisher: Republisher,
}

impl DeprioritizeStrategy {
    pub fn new(republisher: Republisher) -> Self {
        Self { republisher }
    }
}

#[async_trait]
impl RetryStrategy for DeprioritizeStrategy {
    fn compute_requeue(&self, message: &Message, _attempt: u32) -> RequeueParameters {
        RequeueParameters::with_priority(message.priority().saturating_sub(1))
    }

    fn republisher(&self) -> &Republisher {
        &self.republisher
    }
}
