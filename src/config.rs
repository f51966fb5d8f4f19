use std::time::Duration;

/// Default maximum byte length of one physical chunk: 1.5 MiB, comfortably
/// below the ~2 MiB row ceiling the mobile key-value backends enforce.
pub const DEFAULT_CHUNK_SIZE: usize = 1_572_864;

/// Tuning knobs for the storage layer.
///
/// Explicitly constructed and passed into each component; there is no
/// module-level state. Clone it freely; it is a handful of plain values.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum byte length of a single physical chunk. Must stay strictly
    /// below the backend's row-size ceiling; a chunk that still exceeds the
    /// ceiling surfaces as an oversized-write error and triggers a full
    /// reset rather than automatic re-chunking.
    pub chunk_size: usize,
    /// Pause between wiping corrupted data and writing the empty defaults,
    /// giving the backend time to settle.
    pub reset_settle_delay: Duration,
    /// Pause before the single load retry.
    pub load_retry_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            reset_settle_delay: Duration::from_millis(100),
            load_retry_delay: Duration::from_millis(500),
        }
    }
}

impl StoreConfig {
    /// Default config with a custom chunk size. Tests use tiny sizes so the
    /// chunked paths trigger without megabyte payloads.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }
}
