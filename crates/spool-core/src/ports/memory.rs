//! MemoryProbe port - 常駐メモリ使用量の取得

/// Samples the current memory usage of the process.
pub trait MemoryProbe: Send + Sync {
    /// Resident memory in bytes (0 when unknown).
    fn resident_bytes(&self) -> u64;
}
