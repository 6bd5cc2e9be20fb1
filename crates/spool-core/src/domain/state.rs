//! Consumer state: lifecycle phase and the counters limiters read.

use tokio::time::Instant;
use std::time::Duration;

/// Consumer lifecycle.
///
/// State transitions:
/// - Idle -> Running (consume() entered)
/// - Running -> Draining (limiter reached, or a fault escaped the loop)
/// - Draining -> Stopped (shutdown sequence finished)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerPhase {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl ConsumerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConsumerPhase::Stopped)
    }
}

/// Snapshot of the running consumer, lent to limiters after each message.
///
/// Owned and mutated by the consumer only.
#[derive(Debug, Clone)]
pub struct ConsumerState {
    processed: u64,
    started_at: Instant,
    memory_bytes: u64,
    running: bool,
}

impl ConsumerState {
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started_at: Instant) -> Self {
        Self {
            processed: 0,
            started_at,
            memory_bytes: 0,
            running: true,
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Last sampled resident memory, in bytes.
    pub fn memory_bytes(&self) -> u64 {
        self.memory_bytes
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Count one processed message; returns the new total.
    pub(crate) fn record_processed(&mut self) -> u64 {
        self.processed += 1;
        self.processed
    }

    pub(crate) fn sample_memory(&mut self, bytes: u64) {
        self.memory_bytes = bytes;
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
    }

    #[cfg(test)]
    pub(crate) fn with_processed(mut self, processed: u64) -> Self {
        self.processed = processed;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_memory(mut self, bytes: u64) -> Self {
        self.memory_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stopped_is_terminal() {
        assert!(ConsumerPhase::Stopped.is_terminal());
        assert!(!ConsumerPhase::Draining.is_terminal());
        assert!(!ConsumerPhase::Idle.is_terminal());
    }

    #[tokio::test]
    async fn counts_processed_messages() {
        let mut state = ConsumerState::start();
        assert!(state.is_running());
        assert_eq!(state.record_processed(), 1);
        assert_eq!(state.record_processed(), 2);
        state.stop();
        assert!(!state.is_running());
        assert_eq!(state.processed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_follows_the_clock() {
        let state = ConsumerState::start();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(state.elapsed(), Duration::from_secs(3));
    }
}
