//! FlushCoordinator: batched side effects.
//!
//! The consumer calls `flush()` every `batch_size` processed messages and once
//! more during shutdown, so commit-style work runs per batch instead of per
//! message.

use std::sync::Arc;

use crate::domain::SpoolError;
use crate::ports::Flusher;

/// Ordered, append-only set of flushers.
#[derive(Default)]
pub struct FlushCoordinator {
    flushers: Vec<Arc<dyn Flusher>>,
    flushes: u64,
}

impl FlushCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_flusher(&mut self, flusher: Arc<dyn Flusher>) {
        self.flushers.push(flusher);
    }

    pub fn len(&self) -> usize {
        self.flushers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flushers.is_empty()
    }

    /// How many times `flush()` has been invoked.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Run every flusher in registration order.
    ///
    /// The first error stops the remaining flushers and is returned as is.
    pub async fn flush(&mut self) -> Result<(), SpoolError> {
        self.flushes += 1;
        for flusher in &self.flushers {
            tracing::trace!(flusher = flusher.name(), "flushing");
            flusher.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl Flusher for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn flush(&self) -> Result<(), SpoolError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(SpoolError::flush(self.name, "commit failed"));
            }
            Ok(())
        }
    }

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Arc<dyn Flusher> {
        Arc::new(Recording {
            name,
            log: log.clone(),
            fail,
        })
    }

    #[tokio::test]
    async fn flushes_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut coordinator = FlushCoordinator::new();
        coordinator.add_flusher(recording("orm", &log, false));
        coordinator.add_flusher(recording("search", &log, false));

        coordinator.flush().await.unwrap();
        coordinator.flush().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["orm", "search", "orm", "search"]);
        assert_eq!(coordinator.flushes(), 2);
    }

    #[tokio::test]
    async fn error_stops_remaining_flushers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut coordinator = FlushCoordinator::new();
        coordinator.add_flusher(recording("orm", &log, true));
        coordinator.add_flusher(recording("search", &log, false));

        let err = coordinator.flush().await.unwrap_err();
        assert!(matches!(err, SpoolError::Flush { ref flusher, .. } if flusher == "orm"));
        assert_eq!(*log.lock().unwrap(), vec!["orm"]);
    }

    #[tokio::test]
    async fn empty_coordinator_still_counts() {
        let mut coordinator = FlushCoordinator::new();
        assert!(coordinator.is_empty());
        coordinator.flush().await.unwrap();
        assert_eq!(coordinator.flushes(), 1);
    }
}
