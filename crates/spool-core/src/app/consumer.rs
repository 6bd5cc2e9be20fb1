//! Consumer - メッセージ消費ループ
//!
//! # フロー（1 イテレーション）
//! 1. Queue::fetch()（無ければ wait_interval だけ待って limiter を確認）
//! 2. Processor::process() → ack / nack
//! 3. processed をカウントし、batch_size ごとに flush
//! 4. limiter を登録順に評価（最初に到達したものでループ終了）
//! 5. cool_down だけ待つ
//!
//! # Shutdown（必ず 1 回だけ実行）
//! - 最後の flush
//! - Queue の購読を cancel
//! - min_runtime に満たなければ残り時間 sleep（supervisor に crash loop と判定させないため）
//!
//! ループが fault で抜けた場合も shutdown を実行してから呼び出し元にエラーを返す。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;

use crate::app::config::ConsumerConfig;
use crate::domain::{ConsumerPhase, ConsumerState, ConsumerTag, Message, ProcessOutcome, SpoolError};
use crate::flush::FlushCoordinator;
use crate::limiter::LimiterSet;
use crate::ports::{MemoryProbe, Processor, Queue};

/// Payloads longer than this are shortened in log lines.
const PAYLOAD_PREVIEW_WIDTH: usize = 100;

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumeReport {
    pub consumer_tag: ConsumerTag,
    pub started_at: DateTime<Utc>,
    pub processed: u64,
    pub elapsed: Duration,

    /// Flush invocations, including the final one at shutdown.
    pub flushes: u64,

    /// Reason reported by the limiter that ended the run.
    pub stop_reason: String,
}

/// Everything the builder wires into a consumer.
pub(crate) struct ConsumerParts {
    pub tag: ConsumerTag,
    pub queue: Arc<dyn Queue>,
    pub processor: Arc<dyn Processor>,
    pub limiters: LimiterSet,
    pub flush: FlushCoordinator,
    pub memory_probe: Arc<dyn MemoryProbe>,
    pub config: ConsumerConfig,
}

/// Single-use loop driver. Build it with `ConsumerBuilder`.
pub struct Consumer {
    tag: ConsumerTag,
    queue: Arc<dyn Queue>,
    processor: Arc<dyn Processor>,
    limiters: LimiterSet,
    flush: FlushCoordinator,
    memory_probe: Arc<dyn MemoryProbe>,
    config: ConsumerConfig,
    phase: ConsumerPhase,
}

impl Consumer {
    pub(crate) fn new(parts: ConsumerParts) -> Self {
        Self {
            tag: parts.tag,
            queue: parts.queue,
            processor: parts.processor,
            limiters: parts.limiters,
            flush: parts.flush,
            memory_probe: parts.memory_probe,
            config: parts.config,
            phase: ConsumerPhase::Idle,
        }
    }

    pub fn tag(&self) -> &ConsumerTag {
        &self.tag
    }

    pub fn phase(&self) -> ConsumerPhase {
        self.phase
    }

    pub fn limiter_count(&self) -> usize {
        self.limiters.len()
    }

    /// Run until a limiter stops the loop or a fault escapes it.
    ///
    /// The shutdown sequence runs exactly once on both paths. A consumer can
    /// only be consumed once.
    pub async fn consume(&mut self) -> Result<ConsumeReport, SpoolError> {
        if self.phase != ConsumerPhase::Idle {
            return Err(SpoolError::AlreadyConsumed);
        }

        let started_at = Utc::now();
        let mut state = ConsumerState::start();
        self.phase = ConsumerPhase::Running;
        tracing::info!(
            consumer_tag = %self.tag,
            queue = self.queue.name(),
            "Consuming from queue"
        );

        let result = self.run(&mut state).await;
        if let Err(err) = &result {
            tracing::info!(
                consumer_tag = %self.tag,
                error = %err,
                "Uncaught error thrown by consumer, shutting down gracefully"
            );
        }

        self.phase = ConsumerPhase::Draining;
        state.stop();
        let shutdown = self.shutdown(&state).await;
        self.phase = ConsumerPhase::Stopped;

        let stop_reason = match (result, shutdown) {
            (Ok(reason), Ok(())) => reason,
            (Ok(_), Err(err)) => return Err(err),
            (Err(err), Ok(())) => return Err(err),
            (Err(err), Err(shutdown_err)) => {
                tracing::error!(
                    consumer_tag = %self.tag,
                    error = %shutdown_err,
                    "shutdown failed after an earlier error"
                );
                return Err(err);
            }
        };

        let report = ConsumeReport {
            consumer_tag: self.tag.clone(),
            started_at,
            processed: state.processed(),
            elapsed: state.elapsed(),
            flushes: self.flush.flushes(),
            stop_reason,
        };
        tracing::info!(
            consumer_tag = %self.tag,
            processed = report.processed,
            elapsed_secs = report.elapsed.as_secs(),
            "Consumed {} messages in {} seconds",
            report.processed,
            report.elapsed.as_secs()
        );
        Ok(report)
    }

    /// The poll loop. Returns the limiter reason that ended it.
    async fn run(&mut self, state: &mut ConsumerState) -> Result<String, SpoolError> {
        let batch_size = self.config.batch_size.max(1) as u64;
        let cool_down = self.config.cool_down();

        loop {
            let Some(message) = self.queue.fetch().await? else {
                self.idle_wait().await;
                if let Some(reason) = self.check_limits(state) {
                    return Ok(reason);
                }
                continue;
            };

            self.handle(&message).await?;

            if state.record_processed() % batch_size == 0 {
                tracing::debug!(consumer_tag = %self.tag, "Batch completed, flushing");
                self.flush.flush().await?;
            }

            let stop = self.check_limits(state);

            if !cool_down.is_zero() {
                tokio::time::sleep(cool_down).await;
            }

            if let Some(reason) = stop {
                return Ok(reason);
            }
        }
    }

    async fn idle_wait(&self) {
        let wait = self.config.wait_interval();
        if wait.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(wait).await;
        }
    }

    /// Process one delivery and settle it with the queue.
    async fn handle(&self, message: &Message) -> Result<(), SpoolError> {
        let tag = message.tag_label();
        tracing::info!(
            delivery_tag = %tag,
            attempt = message.attempt(),
            payload = %payload_preview(
                message.body(),
                tracing::enabled!(tracing::Level::TRACE)
            ),
            "Processing payload"
        );

        // A panic in processor code is a fault like any other: shutdown must still run.
        let processed = AssertUnwindSafe(self.processor.process(message))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SpoolError::processor(tag.clone(), panic_reason(panic))));

        let outcome = match processed {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(delivery_tag = %tag, error = %err, "processor raised an error");
                // Put the delivery back so the fault does not lose it.
                if let Err(nack_err) = self.queue.nack(message, true).await {
                    tracing::warn!(delivery_tag = %tag, error = %nack_err, "nack after fault failed");
                }
                return Err(err);
            }
        };

        match &outcome {
            ProcessOutcome::Success | ProcessOutcome::Retried { .. } => {
                self.queue.ack(message).await?;
            }
            ProcessOutcome::Failure { reason } => {
                tracing::warn!(delivery_tag = %tag, %reason, "message processing failed");
                if self.config.reject_failed {
                    self.queue.nack(message, false).await?;
                } else {
                    self.queue.ack(message).await?;
                }
            }
        }

        tracing::info!(delivery_tag = %tag, result = %outcome, "processed with result");
        Ok(())
    }

    /// Sample memory, then ask the limiters. `Some(reason)` ends the loop.
    fn check_limits(&self, state: &mut ConsumerState) -> Option<String> {
        state.sample_memory(self.memory_probe.resident_bytes());
        let reason = self.limiters.first_reached(state)?;
        tracing::info!(consumer_tag = %self.tag, %reason, "limit reached, stopping");
        Some(reason)
    }

    /// Final flush, cancel, minimum runtime. Every step runs even if an
    /// earlier one failed; the first error is returned.
    async fn shutdown(&mut self, state: &ConsumerState) -> Result<(), SpoolError> {
        tracing::info!(consumer_tag = %self.tag, "Shutting down consumer");

        let flushed = self.flush.flush().await;
        if let Err(err) = &flushed {
            tracing::error!(consumer_tag = %self.tag, error = %err, "final flush failed");
        }

        let cancelled = self.queue.cancel(&self.tag).await;
        if let Err(err) = &cancelled {
            tracing::error!(consumer_tag = %self.tag, error = %err, "cancel failed");
        }

        let min_runtime = self.config.min_runtime();
        let elapsed = state.elapsed();
        if elapsed < min_runtime {
            let remaining = min_runtime - elapsed;
            tracing::debug!(
                consumer_tag = %self.tag,
                remaining = ?remaining,
                "Sleeping for {:.1} seconds so consumer has run for {} seconds",
                remaining.as_secs_f64(),
                min_runtime.as_secs()
            );
            tokio::time::sleep(remaining).await;
        }

        flushed.and(cancelled)
    }
}

fn panic_reason(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string payload".to_string());
    format!("processor panicked: {detail}")
}

/// Payload for log lines: full when `full`, otherwise cut to fit the preview width.
fn payload_preview(body: &[u8], full: bool) -> String {
    let text = String::from_utf8_lossy(body);
    if full || text.chars().count() <= PAYLOAD_PREVIEW_WIDTH {
        return text.into_owned();
    }
    let mut preview: String = text.chars().take(PAYLOAD_PREVIEW_WIDTH - 10).collect();
    preview.push_str("...");
    preview
}
