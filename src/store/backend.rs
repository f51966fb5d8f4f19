//! External key-value backend trait.
//!
//! The host environment provides the actual store: on device this is the
//! platform's key-value API; `MemoryBackend` and `FileBackend` cover tests
//! and desktop hosts. The one property every implementation shares is a hard
//! per-entry size ceiling: a `set` whose value exceeds it must fail, and the
//! error must be recognizable through
//! [`StoreError::is_oversized_write`](crate::error::StoreError::is_oversized_write).

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous string-keyed, string-valued store.
///
/// All methods take `&self`; implementations handle their own interior
/// mutability. Used behind `Arc<B>` by every layer above.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Read one entry. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write one entry. Fails with an oversized-write error when `value`
    /// exceeds the backend's row ceiling.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete one entry. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Every key currently present, in no particular order.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Delete a batch of keys in one call. Implementations may fail the
    /// whole batch; callers that need per-key resilience fall back to
    /// individual [`remove`](Self::remove) calls.
    async fn remove_many(&self, keys: &[String]) -> Result<()>;
}
