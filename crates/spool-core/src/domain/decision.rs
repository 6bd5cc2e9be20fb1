//! Retry decision model.
//!
//! `RetryDecision` は「失敗したメッセージをどうするか」だけを表す純粋な値。
//! 実際の再 publish は RetryStrategy 側で行う。

use std::time::Duration;

/// How a retried message is requeued.
///
/// `None` fields mean "keep what the message already has".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequeueParameters {
    /// Delay before the broker delivers the copy.
    pub delay: Option<Duration>,

    /// Delivery priority of the copy.
    pub priority: Option<u8>,
}

impl RequeueParameters {
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            priority: None,
        }
    }

    pub fn with_priority(priority: u8) -> Self {
        Self {
            delay: None,
            priority: Some(priority),
        }
    }
}

/// The next action for a failed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Republish as `attempt`.
    Requeue { attempt: u32 },

    /// Attempt budget exhausted; let the failure through.
    GiveUp { attempts: u32 },
}

impl RetryDecision {
    /// Decide from the attempt counter of the failed message.
    ///
    /// A message on attempt `a` has been tried `a + 1` times. It is requeued
    /// while `a + 1 < max_attempts`.
    pub fn for_attempt(current_attempt: u32, max_attempts: u32) -> Self {
        let next = current_attempt.saturating_add(1);
        if next < max_attempts {
            RetryDecision::Requeue { attempt: next }
        } else {
            RetryDecision::GiveUp { attempts: next }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::first_failure(0, 3, RetryDecision::Requeue { attempt: 1 })]
    #[case::second_failure(1, 3, RetryDecision::Requeue { attempt: 2 })]
    #[case::third_failure(2, 3, RetryDecision::GiveUp { attempts: 3 })]
    #[case::single_attempt(0, 1, RetryDecision::GiveUp { attempts: 1 })]
    #[case::past_budget(7, 3, RetryDecision::GiveUp { attempts: 8 })]
    fn decides_from_attempt_counter(
        #[case] attempt: u32,
        #[case] max_attempts: u32,
        #[case] expected: RetryDecision,
    ) {
        assert_eq!(RetryDecision::for_attempt(attempt, max_attempts), expected);
    }
}
