//! Ports - 外部コラボレータとの境界
//!
//! consumer runtime が依存するのはこの trait だけ。
//! broker クライアントや ORM などの実装は外側（または `impls`）に置く。
//!
//! # 含まれる port
//! - **Queue**: fetch / ack / nack / cancel
//! - **Publisher**: retry 時の再 publish
//! - **Processor**: メッセージごとの業務ロジック
//! - **Flusher**: バッチ単位の副作用
//! - **MemoryProbe**: メモリ使用量のサンプリング

pub mod flusher;
pub mod memory;
pub mod processor;
pub mod publisher;
pub mod queue;

pub use self::flusher::Flusher;
pub use self::memory::MemoryProbe;
pub use self::processor::Processor;
pub use self::publisher::Publisher;
pub use self::queue::Queue;
