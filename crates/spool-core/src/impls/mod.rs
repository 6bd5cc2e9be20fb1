//! Impls - port の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryBroker**: 名前付き queue・priority・遅延配送・dead-letter を持つ開発用 broker
//!   - `InMemoryQueue`: `Queue` port の実装（broker 上の 1 queue へのハンドル）
//!   - `InMemoryPublisher`: `Publisher` port の実装
//! - **ProcessMemoryProbe** / **FixedMemoryProbe**: `MemoryProbe` port の実装
//!
//! 本番用の broker クライアント（AMQP など）は別クレートに置く想定。

pub mod memory_probe;
pub mod memory_queue;

pub use self::memory_probe::{FixedMemoryProbe, ProcessMemoryProbe};
pub use self::memory_queue::{InMemoryBroker, InMemoryPublisher, InMemoryQueue, QueueCounts};
