//! Best-effort data recovery.
//!
//! When the primary read path comes back empty or corrupt, [`Recovery`]
//! tries three strategies in order: the raw direct record, the chunked
//! reconstruction, and finally the backup snapshot taken before the last
//! overwrite. The first value that parses as JSON wins. Nothing here ever
//! returns an error; a failed strategy just means "try the next one".

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use super::backend::KeyValueBackend;
use super::backup_key;
use super::chunked::ChunkedStore;

pub struct Recovery<B> {
    store: ChunkedStore<B>,
}

impl<B: KeyValueBackend> Recovery<B> {
    pub fn new(store: ChunkedStore<B>) -> Self {
        Self { store }
    }

    /// Try to reconstruct the logical record for `key`. Returns the first
    /// strategy's value that parses, or `None` when all three fail.
    pub async fn attempt_recovery(&self, key: &str) -> Option<Value> {
        // 1. Direct backend read, bypassing the chunked layer entirely.
        match self.store.backend().get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    info!("recovered '{key}' from the direct record");
                    return Some(value);
                }
                Err(e) => debug!("direct record for '{key}' does not parse: {e}"),
            },
            Ok(None) => debug!("no direct record for '{key}'"),
            Err(e) => debug!("direct read of '{key}' failed: {e}"),
        }

        // 2. Chunk reconstruction.
        match self.store.get_item(key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    info!("recovered '{key}' from its chunked representation");
                    return Some(value);
                }
                Err(e) => debug!("chunked payload for '{key}' does not parse: {e}"),
            },
            Ok(None) => debug!("no chunked representation for '{key}'"),
            Err(e) => debug!("chunked read of '{key}' failed: {e}"),
        }

        // 3. The pre-overwrite backup, itself stored through the chunked
        // layer and so possibly chunked.
        match self.store.get_item(&backup_key(key)).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    info!("recovered '{key}' from its backup snapshot");
                    return Some(value);
                }
                Err(e) => debug!("backup for '{key}' does not parse: {e}"),
            },
            Ok(None) => debug!("no backup for '{key}'"),
            Err(e) => debug!("backup read of '{key}' failed: {e}"),
        }

        warn!("all recovery strategies failed for '{key}'");
        None
    }

    /// Snapshot `value` to `{key}_backup` through the chunked store.
    ///
    /// Best-effort by design: a failed backup is logged and swallowed so it
    /// can never block the primary write that follows it.
    pub async fn create_backup<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.store.set_item(&backup_key(key), value).await {
            warn!("backup write for '{key}' failed (ignored): {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::store::mem_backend::MemoryBackend;
    use crate::store::{chunk_key, meta_key};
    use std::sync::Arc;

    fn fixture(chunk_size: usize) -> (Arc<MemoryBackend>, Recovery<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = ChunkedStore::new(
            Arc::clone(&backend),
            StoreConfig::with_chunk_size(chunk_size),
        );
        (backend, Recovery::new(store))
    }

    #[tokio::test]
    async fn direct_record_wins_when_it_parses() {
        let (backend, recovery) = fixture(64);
        backend.insert_raw("NOTES", "[1,2,3]");

        let value = recovery.attempt_recovery("NOTES").await.unwrap();
        assert_eq!(value, serde_json::json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn falls_back_to_chunked_reconstruction() {
        let (backend, recovery) = fixture(8);
        // Corrupt direct record plus a healthy chunked family, built by
        // hand so the corrupt direct record stays in place (set_item would
        // remove it).
        backend.insert_raw("NOTES", "{truncated");
        let payload = serde_json::to_string(&vec!["a"; 10]).unwrap();
        let mut offset = 0;
        let mut index = 0;
        while offset < payload.len() {
            let end = (offset + 8).min(payload.len());
            backend.insert_raw(&chunk_key("NOTES", index), &payload[offset..end]);
            offset = end;
            index += 1;
        }
        backend.insert_raw(
            &meta_key("NOTES"),
            &format!(
                "{{\"chunked\":true,\"totalChunks\":{index},\"originalSize\":{}}}",
                payload.len()
            ),
        );

        let value = recovery.attempt_recovery("NOTES").await.unwrap();
        assert_eq!(value, serde_json::json!(vec!["a"; 10]));
    }

    #[tokio::test]
    async fn falls_back_to_backup_when_primary_is_gone() {
        let (backend, recovery) = fixture(64);
        backend.insert_raw("NOTES", "{truncated");
        backend.insert_raw(&backup_key("NOTES"), "[\"from backup\"]");

        let value = recovery.attempt_recovery("NOTES").await.unwrap();
        assert_eq!(value, serde_json::json!(["from backup"]));
    }

    #[tokio::test]
    async fn backup_is_used_even_when_direct_read_errors() {
        let (backend, recovery) = fixture(64);
        backend.insert_raw("NOTES", "[]");
        backend.insert_raw(&backup_key("NOTES"), "[42]");
        // Direct and chunked strategies both hit the read fault.
        backend.fail_reads_of("NOTES", 2);

        let value = recovery.attempt_recovery("NOTES").await.unwrap();
        assert_eq!(value, serde_json::json!([42]));
    }

    #[tokio::test]
    async fn returns_none_when_everything_fails() {
        let (backend, recovery) = fixture(64);
        backend.insert_raw("NOTES", "{truncated");
        backend.insert_raw(&backup_key("NOTES"), "also not json");

        assert!(recovery.attempt_recovery("NOTES").await.is_none());
    }

    #[tokio::test]
    async fn create_backup_snapshots_through_the_chunked_store() {
        let (backend, recovery) = fixture(8);
        let big = vec!["note"; 20];
        recovery.create_backup("NOTES", &big).await;

        // Large snapshot, so the backup family itself is chunked.
        assert!(backend.contains_key(&meta_key(&backup_key("NOTES"))));

        let value = recovery.attempt_recovery("NOTES").await.unwrap();
        assert_eq!(value, serde_json::json!(vec!["note"; 20]));
    }

    #[tokio::test]
    async fn backup_failures_are_swallowed() {
        let (backend, recovery) = fixture(64);
        backend.set_fail_writes(true);
        // Must not panic or propagate.
        recovery.create_backup("NOTES", &vec![1, 2, 3]).await;
        assert!(!backend.contains_key(&backup_key("NOTES")));
    }
}
