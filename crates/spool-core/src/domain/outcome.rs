//! Outcome model: what a processor reports for one message.
//!
//! Business failures are values, not errors. Unexpected faults travel as
//! `Err(SpoolError)` and stop the consumer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of processing one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessOutcome {
    /// Work done; the delivery can be acked.
    Success,

    /// Processing failed but a copy was republished as `attempt`.
    /// The original delivery is acked, the copy is the new delivery of record.
    Retried { attempt: u32 },

    /// Processing failed; no retry is pending.
    Failure { reason: String },
}

impl ProcessOutcome {
    pub fn success() -> Self {
        Self::Success
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Retried { attempt } => write!(f, "retried (attempt {attempt})"),
            Self::Failure { reason } => write!(f, "failure: {reason}"),
        }
    }
}
