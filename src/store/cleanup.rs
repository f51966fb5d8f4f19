//! Emergency cleanup: the integrity check and the nuclear option.
//!
//! [`EmergencyCleanup`] works through the plain backend, below the chunked
//! layer; when storage is corrupt enough to land here, the chunked reads
//! themselves can no longer be trusted. A complete reset deletes every trace
//! of the critical key families (direct rows, chunks, metadata, backups) and
//! re-initializes empty defaults.

use std::sync::Arc;

use log::{info, warn};
use tokio::time::sleep;

use super::backend::KeyValueBackend;
use super::{family_members, CRITICAL_KEYS};
use crate::config::StoreConfig;
use crate::error::Result;

pub struct EmergencyCleanup<B> {
    backend: Arc<B>,
    config: StoreConfig,
}

impl<B: KeyValueBackend> EmergencyCleanup<B> {
    pub fn new(backend: Arc<B>, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    /// Parse-only validation of every critical key's direct record. An
    /// absent key is clean; a read error or unparseable value is not.
    pub async fn check_data_integrity(&self) -> bool {
        for key in CRITICAL_KEYS {
            match self.backend.get(key).await {
                Ok(Some(raw)) => {
                    if let Err(e) = serde_json::from_str::<serde_json::Value>(&raw) {
                        warn!("integrity check failed: '{key}' does not parse: {e}");
                        return false;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("integrity check failed: reading '{key}': {e}");
                    return false;
                }
            }
        }
        true
    }

    /// Delete every physical record belonging to a critical key family:
    /// direct rows, chunks, metadata, and backups.
    pub async fn cleanup_corrupted_data(&self) -> Result<()> {
        let keys = self.backend.list_keys().await?;
        let doomed = family_members(&keys, &CRITICAL_KEYS);
        if doomed.is_empty() {
            return Ok(());
        }

        info!("emergency cleanup removing {} keys", doomed.len());
        if let Err(e) = self.backend.remove_many(&doomed).await {
            // Batch removal is the fast path; fall back to one-by-one so a
            // single stubborn row cannot block the reset.
            warn!("batch removal failed ({e}); retrying keys individually");
            for key in &doomed {
                if let Err(e) = self.backend.remove(key).await {
                    warn!("could not remove '{key}': {e}");
                }
            }
        }
        Ok(())
    }

    /// Write empty defaults under each critical key, directly. The payloads
    /// are trivially small, chunking is deliberately bypassed.
    pub async fn initialize_clean_data(&self) -> Result<()> {
        for key in CRITICAL_KEYS {
            self.backend.set(key, "[]").await?;
        }
        Ok(())
    }

    /// The last resort: wipe the critical families, let the backend settle,
    /// then re-initialize empty defaults.
    pub async fn perform_complete_reset(&self) -> Result<()> {
        warn!("performing complete storage reset");
        self.cleanup_corrupted_data().await?;
        sleep(self.config.reset_settle_delay).await;
        self.initialize_clean_data().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::store::chunked::ChunkedStore;
    use crate::store::mem_backend::MemoryBackend;
    use crate::store::{backup_key, CATEGORIES_KEY, NOTES_KEY};
    use std::time::Duration;

    fn fixture() -> (Arc<MemoryBackend>, EmergencyCleanup<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let mut config = StoreConfig::with_chunk_size(16);
        config.reset_settle_delay = Duration::from_millis(1);
        let cleanup = EmergencyCleanup::new(Arc::clone(&backend), config);
        (backend, cleanup)
    }

    #[tokio::test]
    async fn integrity_passes_on_empty_and_valid_storage() {
        let (backend, cleanup) = fixture();
        assert!(cleanup.check_data_integrity().await);

        backend.insert_raw(NOTES_KEY, "[{\"id\":\"x\"}]");
        backend.insert_raw(CATEGORIES_KEY, "[]");
        assert!(cleanup.check_data_integrity().await);
    }

    #[tokio::test]
    async fn integrity_fails_on_corrupt_value() {
        let (backend, cleanup) = fixture();
        backend.insert_raw(NOTES_KEY, "[{\"id\":");
        assert!(!cleanup.check_data_integrity().await);
    }

    #[tokio::test]
    async fn integrity_fails_on_read_error() {
        let (backend, cleanup) = fixture();
        backend.fail_reads_of(NOTES_KEY, 1);
        assert!(!cleanup.check_data_integrity().await);
    }

    #[tokio::test]
    async fn reset_wipes_every_family_trace_and_reinitializes() {
        let (backend, cleanup) = fixture();

        // A chunked notes family, a backup family, and an unrelated key.
        let store = ChunkedStore::new(Arc::clone(&backend), StoreConfig::with_chunk_size(16));
        store
            .set_item(NOTES_KEY, &"n".repeat(100))
            .await
            .unwrap();
        store
            .set_item(&backup_key(NOTES_KEY), &"b".repeat(100))
            .await
            .unwrap();
        backend.insert_raw(CATEGORIES_KEY, "{corrupt");
        backend.insert_raw("SETTINGS", "{\"theme\":\"dark\"}");

        cleanup.perform_complete_reset().await.unwrap();

        let mut keys = backend.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                CATEGORIES_KEY.to_string(),
                NOTES_KEY.to_string(),
                "SETTINGS".to_string()
            ]
        );
        assert_eq!(backend.raw(NOTES_KEY).as_deref(), Some("[]"));
        assert_eq!(backend.raw(CATEGORIES_KEY).as_deref(), Some("[]"));
        // Untouched bystander.
        assert_eq!(
            backend.raw("SETTINGS").as_deref(),
            Some("{\"theme\":\"dark\"}")
        );
    }

    #[tokio::test]
    async fn batch_removal_failure_falls_back_to_per_key() {
        let (backend, cleanup) = fixture();
        backend.insert_raw(NOTES_KEY, "{corrupt");
        backend.insert_raw("NOTES_chunk_0", "junk");
        backend.insert_raw("NOTES_meta", "junk");
        backend.set_fail_batch_removes(true);

        cleanup.cleanup_corrupted_data().await.unwrap();

        assert!(!backend.contains_key(NOTES_KEY));
        assert!(!backend.contains_key("NOTES_chunk_0"));
        assert!(!backend.contains_key("NOTES_meta"));
    }

    #[tokio::test]
    async fn cleanup_with_nothing_to_do_is_a_no_op() {
        let (backend, cleanup) = fixture();
        backend.insert_raw("SETTINGS", "{}");
        cleanup.cleanup_corrupted_data().await.unwrap();
        assert!(backend.contains_key("SETTINGS"));
    }
}
