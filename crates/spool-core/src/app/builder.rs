//! ConsumerBuilder - consumer の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 設定の検証（batch size, max attempts, retry strategy 名）は build() 時に行う
//! - retry を使う設定なのに publisher が無ければ build() でエラー
//! - ループ開始後に設定エラーが出ることはない

use std::sync::Arc;

use crate::app::config::ConsumerConfig;
use crate::app::consumer::{Consumer, ConsumerParts};
use crate::domain::{ConfigError, ConsumerTag};
use crate::flush::FlushCoordinator;
use crate::impls::ProcessMemoryProbe;
use crate::limiter::{Limiter, LimiterSet, MemoryLimiter, MessagesLimiter, TimeLimiter};
use crate::ports::{Flusher, MemoryProbe, Processor, Publisher, Queue};
use crate::retry::{Republisher, RetryProcessor};

const DEFAULT_TAG_PREFIX: &str = "spool";

/// Builds a `Consumer`.
///
/// # 使用例
/// ```ignore
/// let consumer = ConsumerBuilder::new(queue, processor)
///     .config(config)
///     .publisher(publisher)
///     .flusher(orm_flusher)
///     .build()?;
/// ```
///
/// Limiters built from the config come first (messages, memory, time), then
/// the ones added with `limiter()`, in call order.
pub struct ConsumerBuilder {
    queue: Arc<dyn Queue>,
    processor: Arc<dyn Processor>,
    config: ConsumerConfig,
    publisher: Option<Arc<dyn Publisher>>,
    memory_probe: Arc<dyn MemoryProbe>,
    flushers: Vec<Arc<dyn Flusher>>,
    limiters: Vec<Box<dyn Limiter>>,
    consumer_tag: Option<ConsumerTag>,
}

impl ConsumerBuilder {
    pub fn new(queue: Arc<dyn Queue>, processor: Arc<dyn Processor>) -> Self {
        Self {
            queue,
            processor,
            config: ConsumerConfig::default(),
            publisher: None,
            memory_probe: Arc::new(ProcessMemoryProbe::new()),
            flushers: Vec::new(),
            limiters: Vec::new(),
            consumer_tag: None,
        }
    }

    pub fn config(mut self, config: ConsumerConfig) -> Self {
        self.config = config;
        self
    }

    /// Publisher used to republish retried messages.
    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory_probe = probe;
        self
    }

    pub fn flusher(mut self, flusher: Arc<dyn Flusher>) -> Self {
        self.flushers.push(flusher);
        self
    }

    pub fn limiter(mut self, limiter: impl Limiter + 'static) -> Self {
        self.limiters.push(Box::new(limiter));
        self
    }

    pub fn consumer_tag(mut self, tag: ConsumerTag) -> Self {
        self.consumer_tag = Some(tag);
        self
    }

    pub fn build(self) -> Result<Consumer, ConfigError> {
        let strategy_type = self.config.validate()?;

        let mut limiters = LimiterSet::new();
        if self.config.limit > 0 {
            limiters.push(Box::new(MessagesLimiter::new(self.config.limit)));
        }
        if self.config.max_memory > 0 {
            limiters.push(Box::new(MemoryLimiter::new(self.config.max_memory)));
        }
        if self.config.max_time > 0 {
            limiters.push(Box::new(TimeLimiter::from_secs(self.config.max_time)));
        }
        for limiter in self.limiters {
            limiters.push(limiter);
        }

        let processor = if self.config.retries_enabled() {
            let publisher = self
                .publisher
                .ok_or(ConfigError::MissingPublisher(self.config.max_attempts))?;
            let destination = self
                .config
                .retry_destination
                .clone()
                .unwrap_or_else(|| self.queue.name().to_string());
            let republisher = Republisher::new(publisher).with_destination(destination);
            let strategy = strategy_type.build(republisher, self.config.backoff.clone());
            Arc::new(RetryProcessor::new(
                self.processor,
                strategy,
                self.config.max_attempts,
            )) as Arc<dyn Processor>
        } else {
            self.processor
        };

        let mut flush = FlushCoordinator::new();
        for flusher in self.flushers {
            flush.add_flusher(flusher);
        }

        Ok(Consumer::new(ConsumerParts {
            tag: self
                .consumer_tag
                .unwrap_or_else(|| ConsumerTag::generate(DEFAULT_TAG_PREFIX)),
            queue: self.queue,
            processor,
            limiters,
            flush,
            memory_probe: self.memory_probe,
            config: self.config,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, ProcessOutcome, SpoolError};
    use crate::impls::InMemoryBroker;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Processor for Noop {
        async fn process(&self, _message: &Message) -> Result<ProcessOutcome, SpoolError> {
            Ok(ProcessOutcome::success())
        }
    }

    async fn builder() -> ConsumerBuilder {
        let broker = InMemoryBroker::new();
        let queue = broker.queue("jobs").await;
        ConsumerBuilder::new(Arc::new(queue), Arc::new(Noop))
    }

    #[tokio::test]
    async fn build_success_with_defaults() {
        let consumer = builder().await.build().unwrap();
        assert_eq!(consumer.limiter_count(), 0);
        assert!(consumer.tag().as_str().starts_with("spool-"));
    }

    #[tokio::test]
    async fn limiters_from_config_skip_zero_thresholds() {
        let config = ConsumerConfig {
            limit: 10,
            max_time: 60,
            ..ConsumerConfig::default()
        };
        let consumer = builder()
            .await
            .config(config)
            .limiter(MessagesLimiter::new(5))
            .build()
            .unwrap();
        assert_eq!(consumer.limiter_count(), 3);
    }

    #[tokio::test]
    async fn retries_without_publisher_fail_fast() {
        let config = ConsumerConfig {
            max_attempts: 3,
            ..ConsumerConfig::default()
        };
        let result = builder().await.config(config).build();
        assert!(matches!(result, Err(ConfigError::MissingPublisher(3))));
    }

    #[tokio::test]
    async fn unsupported_strategy_fails_fast() {
        let broker = InMemoryBroker::new();
        let config = ConsumerConfig {
            max_attempts: 3,
            retry_strategy: "exponential".to_string(),
            ..ConsumerConfig::default()
        };
        let result = builder()
            .await
            .config(config)
            .publisher(Arc::new(broker.publisher("jobs")))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedRetryStrategy(name)) if name == "exponential"
        ));
    }

    #[tokio::test]
    async fn explicit_consumer_tag_is_kept() {
        let consumer = builder()
            .await
            .consumer_tag(ConsumerTag::new("worker-1"))
            .build()
            .unwrap();
        assert_eq!(consumer.tag().as_str(), "worker-1");
    }
}
