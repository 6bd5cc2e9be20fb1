use std::time::Duration;

use super::{LimitStatus, Limiter};
use crate::domain::ConsumerState;

/// Stops once the consumer has been running for `max_time`.
#[derive(Debug, Clone, Copy)]
pub struct TimeLimiter {
    max_time: Duration,
}

impl TimeLimiter {
    pub fn new(max_time: Duration) -> Self {
        Self { max_time }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}

impl Limiter for TimeLimiter {
    fn evaluate(&self, state: &ConsumerState) -> LimitStatus {
        if !self.max_time.is_zero() && state.elapsed() >= self.max_time {
            return LimitStatus::reached(format!(
                "Maximum execution time of {}s reached",
                self.max_time.as_secs()
            ));
        }
        LimitStatus::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn triggers_once_deadline_passed() {
        let state = ConsumerState::start();
        let limiter = TimeLimiter::from_secs(5);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(limiter.evaluate(&state), LimitStatus::Continue);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            limiter.evaluate(&state),
            LimitStatus::reached("Maximum execution time of 5s reached")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_disables() {
        let state = ConsumerState::start();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(TimeLimiter::from_secs(0).evaluate(&state), LimitStatus::Continue);
    }
}
