//! App - アプリケーション層
//!
//! ports・limiter・retry・flush を組み合わせて消費ループを実装します。
//!
//! # 主要コンポーネント
//! - **ConsumerConfig**: 設定（JSON から読み込み可能）
//! - **ConsumerBuilder**: 構築とワイヤリング（設定エラーはここで検出）
//! - **Consumer**: 消費ループ（fetch→process→ack/nack→flush→limiter）と shutdown

pub mod builder;
pub mod config;
pub mod consumer;

// 主要な型を再エクスポート
pub use self::builder::ConsumerBuilder;
pub use self::config::ConsumerConfig;
pub use self::consumer::{ConsumeReport, Consumer};
