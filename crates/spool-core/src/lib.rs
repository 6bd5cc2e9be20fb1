//! spool-core
//!
//! Building blocks for long-running queue consumers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, outcome, decision, state, errors）
//! - **ports**: 抽象化レイヤー（Queue, Publisher, Processor, Flusher, MemoryProbe）
//! - **limiter**: 消費ループの終了条件（messages, memory, time, cancel）
//! - **retry**: 失敗時の再投入（backoff, deprioritize）
//! - **flush**: バッチ単位の副作用
//! - **app**: 設定・builder・消費ループ
//! - **impls**: 実装（InMemoryBroker など開発用）

pub mod app;
pub mod domain;
pub mod flush;
pub mod impls;
pub mod limiter;
pub mod ports;
pub mod retry;

pub use app::{ConsumeReport, Consumer, ConsumerBuilder, ConsumerConfig};
pub use domain::{ConfigError, Message, ProcessOutcome, SpoolError};
pub use flush::FlushCoordinator;
