//! Chunked store: transparent splitting of oversized logical records.
//!
//! [`ChunkedStore`] exposes the same get/set/remove contract as the raw
//! backend while keeping every physical row below the configured chunk size.
//! Payloads under the threshold are stored directly; anything else is split
//! into `{key}_chunk_{i}` rows plus a `{key}_meta` record written last,
//! so a reader can never observe metadata pointing at chunks that do not
//! exist yet.
//!
//! Writes to the same logical key serialize on a per-key async mutex;
//! overlapping writers from rapid edits would otherwise interleave their
//! chunk rows and leave the key with both representations at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use super::backend::KeyValueBackend;
use super::{chunk_key, meta_key};
use crate::config::StoreConfig;
use crate::error::Result;

/// Metadata record describing the chunked representation of a logical key.
/// Stored under `{key}_meta`, camelCase on the wire. Present iff the record
/// is chunked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    pub chunked: bool,
    pub total_chunks: usize,
    /// Byte length of the full serialized payload; chunk lengths sum to it.
    pub original_size: usize,
}

/// Best-effort instrumentation over the whole backend, not
/// consistency-critical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub total_keys: usize,
    /// Number of chunked key families (counted via their `_meta` records).
    pub chunked_keys: usize,
    /// Summed byte length of all direct (non-chunk, non-meta) records.
    pub total_size: usize,
}

pub struct ChunkedStore<B> {
    backend: Arc<B>,
    config: StoreConfig,
    /// One async mutex per logical key, created on first write.
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

// Manual impl: `B` itself need not be Clone behind the Arc.
impl<B> Clone for ChunkedStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<B: KeyValueBackend> ChunkedStore<B> {
    pub fn new(backend: Arc<B>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn write_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Serialize `value` and persist it under `key`, chunking when the
    /// payload reaches the configured chunk size.
    ///
    /// Chunk writes are issued concurrently and are not transactional: if
    /// one fails the error propagates and successfully written siblings stay
    /// behind. They are invisible to readers (no metadata points at them)
    /// and the next successful write or removal clears them.
    pub async fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let lock = self.write_lock(key);
        let _guard = lock.lock().await;

        let previous_meta = self.read_meta(key).await?;

        if payload.len() < self.config.chunk_size {
            // Direct representation. Remove the chunked form first, metadata
            // before chunk rows, so the chunked form stops being readable
            // before the direct form appears and no reader sees both.
            if let Some(meta) = &previous_meta {
                self.backend.remove(&meta_key(key)).await?;
                self.remove_chunks(key, 0, meta.total_chunks).await?;
            }
            self.backend.set(key, &payload).await?;
            debug!("stored '{key}' directly ({} bytes)", payload.len());
            return Ok(());
        }

        // Chunked representation. Drop the direct record first, write every
        // chunk, then the metadata record last.
        self.backend.remove(key).await?;

        let slices = split_payload(&payload, self.config.chunk_size);
        let total_chunks = slices.len();
        let writes = slices.into_iter().enumerate().map(|(index, slice)| {
            let backend = Arc::clone(&self.backend);
            let physical = chunk_key(key, index);
            async move { backend.set(&physical, slice).await }
        });
        try_join_all(writes).await?;

        let meta = ChunkMeta {
            chunked: true,
            total_chunks,
            original_size: payload.len(),
        };
        self.backend
            .set(&meta_key(key), &serde_json::to_string(&meta)?)
            .await?;

        // A shrinking chunk count leaves stale higher-index rows behind.
        if let Some(prev) = previous_meta {
            if prev.total_chunks > total_chunks {
                self.remove_chunks(key, total_chunks, prev.total_chunks)
                    .await?;
            }
        }

        debug!(
            "stored '{key}' as {total_chunks} chunks ({} bytes)",
            payload.len()
        );
        Ok(())
    }

    /// Reconstruct the serialized payload for `key`.
    ///
    /// Direct read first, then chunk reassembly. A missing chunk means the
    /// record is treated as not found: `Ok(None)`, never a truncated
    /// string; the caller falls back to recovery.
    pub async fn get_item(&self, key: &str) -> Result<Option<String>> {
        if let Some(direct) = self.backend.get(key).await? {
            return Ok(Some(direct));
        }

        let Some(meta) = self.read_meta(key).await? else {
            return Ok(None);
        };
        if !meta.chunked || meta.total_chunks == 0 {
            return Ok(None);
        }

        let reads = (0..meta.total_chunks).map(|index| {
            let backend = Arc::clone(&self.backend);
            let physical = chunk_key(key, index);
            async move { backend.get(&physical).await }
        });
        let chunks = try_join_all(reads).await?;

        let mut payload = String::with_capacity(meta.original_size);
        for (index, chunk) in chunks.into_iter().enumerate() {
            match chunk {
                Some(text) => payload.push_str(&text),
                None => {
                    warn!("chunk {index} of '{key}' is missing; treating record as not found");
                    return Ok(None);
                }
            }
        }
        if payload.len() != meta.original_size {
            warn!(
                "reassembled '{key}' is {} bytes, metadata says {}",
                payload.len(),
                meta.original_size
            );
        }
        Ok(Some(payload))
    }

    /// Remove `key` in whichever representation it currently has. Backup
    /// records are left alone; only the emergency cleanup deletes those.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        let lock = self.write_lock(key);
        let _guard = lock.lock().await;

        self.backend.remove(key).await?;
        if let Some(meta) = self.read_meta(key).await? {
            let mut doomed: Vec<String> = (0..meta.total_chunks)
                .map(|i| chunk_key(key, i))
                .collect();
            doomed.push(meta_key(key));
            self.backend.remove_many(&doomed).await?;
        }
        Ok(())
    }

    /// Walk the whole backend and summarize it. Keys written concurrently
    /// may be missed or double-counted; this is instrumentation only.
    pub async fn storage_stats(&self) -> Result<StorageStats> {
        let keys = self.backend.list_keys().await?;
        let mut stats = StorageStats {
            total_keys: keys.len(),
            ..Default::default()
        };
        for key in &keys {
            if key.ends_with("_meta") {
                stats.chunked_keys += 1;
                continue;
            }
            if key.contains("_chunk_") {
                continue;
            }
            if let Some(value) = self.backend.get(key).await? {
                stats.total_size += value.len();
            }
        }
        Ok(stats)
    }

    async fn read_meta(&self, key: &str) -> Result<Option<ChunkMeta>> {
        match self.backend.get(&meta_key(key)).await? {
            None => Ok(None),
            Some(text) => match serde_json::from_str(&text) {
                Ok(meta) => Ok(Some(meta)),
                Err(e) => {
                    // Unreadable metadata is treated as absent on the read
                    // path; the corrupt record itself falls to recovery.
                    warn!("unreadable chunk metadata for '{key}': {e}");
                    Ok(None)
                }
            },
        }
    }

    async fn remove_chunks(&self, key: &str, from: usize, to: usize) -> Result<()> {
        let doomed: Vec<String> = (from..to).map(|i| chunk_key(key, i)).collect();
        if doomed.is_empty() {
            return Ok(());
        }
        self.backend.remove_many(&doomed).await
    }
}

/// Split a payload into consecutive slices of at most `chunk_size` bytes,
/// never cutting through a UTF-8 character. Slice lengths sum to the payload
/// length; every slice but the last is within 3 bytes of `chunk_size`.
///
/// A `chunk_size` smaller than the widest character cannot honor the "at
/// most" bound; the slice then holds exactly one character, so progress is
/// still guaranteed.
fn split_payload(payload: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let mut slices = Vec::with_capacity(payload.len() / chunk_size + 1);
    let mut rest = payload;
    while !rest.is_empty() {
        let mut end = chunk_size.min(rest.len());
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        slices.push(head);
        rest = tail;
    }
    slices
}
