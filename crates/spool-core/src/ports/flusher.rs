//! Flusher port - バッチ単位の副作用（commit など）

use async_trait::async_trait;

use crate::domain::SpoolError;

/// A batched side effect, e.g. committing a unit of work to storage.
#[async_trait]
pub trait Flusher: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "flusher"
    }

    async fn flush(&self) -> Result<(), SpoolError>;
}
