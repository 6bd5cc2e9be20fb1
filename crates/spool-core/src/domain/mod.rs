//! Domain model (ids, messages, outcomes, decisions, consumer state, errors).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod message;
pub mod outcome;
pub mod state;

pub use decision::{RequeueParameters, RetryDecision};
pub use errors::{BoxError, ConfigError, SpoolError};
pub use ids::{ConsumerTag, DeliveryTag, MessageId};
pub use message::{DEFAULT_PRIORITY, MAX_PRIORITY, Message};
pub use outcome::ProcessOutcome;
pub use state::{ConsumerPhase, ConsumerState};
