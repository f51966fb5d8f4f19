//! In-memory backend.
//!
//! The default backend for tests, mirroring the semantics of the mobile
//! key-value stores this crate wraps: an optional row ceiling makes
//! oversized writes fail the way the real backend does, and the fault flags
//! let tests drive the recovery paths deterministically.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::backend::KeyValueBackend;
use crate::error::{Result, StoreError};

#[derive(Default)]
struct Faults {
    fail_writes: bool,
    /// Number of upcoming writes that fail before writes heal again.
    fail_next_writes: usize,
    fail_batch_removes: bool,
    /// Key whose reads error out, and how many times before it heals.
    fail_reads: Option<(String, usize)>,
}

pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    row_ceiling: Option<usize>,
    faults: Mutex<Faults>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            row_ceiling: None,
            faults: Mutex::new(Faults::default()),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects any value larger than `ceiling` bytes.
    pub fn with_row_ceiling(ceiling: usize) -> Self {
        Self {
            row_ceiling: Some(ceiling),
            ..Self::default()
        }
    }

    /// Make every subsequent `set` fail with a plain backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock_faults().fail_writes = fail;
    }

    /// Make only the next `times` writes fail, then heal.
    pub fn fail_next_writes(&self, times: usize) {
        self.lock_faults().fail_next_writes = times;
    }

    /// Make `remove_many` fail while individual `remove` calls still work,
    /// to exercise the batch-then-per-key fallback.
    pub fn set_fail_batch_removes(&self, fail: bool) {
        self.lock_faults().fail_batch_removes = fail;
    }

    /// Make the next `times` reads of `key` fail, then heal.
    pub fn fail_reads_of(&self, key: &str, times: usize) {
        self.lock_faults().fail_reads = Some((key.to_string(), times));
    }

    /// Seed an entry directly, bypassing the ceiling and fault flags. Tests
    /// use this to plant corrupt or orphaned records.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.lock_entries().insert(key.to_string(), value.to_string());
    }

    /// Delete an entry out of band, bypassing the fault flags.
    pub fn remove_raw(&self, key: &str) {
        self.lock_entries().remove(key);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock_entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Raw stored value, for assertions on the physical layout.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock_entries().get(key).cloned()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let mut faults = self.lock_faults();
            if let Some((k, times)) = &mut faults.fail_reads {
                if k == key && *times > 0 {
                    *times -= 1;
                    return Err(StoreError::Backend(format!(
                        "Simulated read error for '{key}'"
                    )));
                }
            }
        }
        Ok(self.lock_entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut faults = self.lock_faults();
            if faults.fail_next_writes > 0 {
                faults.fail_next_writes -= 1;
                return Err(StoreError::Backend("Simulated write error".to_string()));
            }
            if faults.fail_writes {
                return Err(StoreError::Backend("Simulated write error".to_string()));
            }
        }
        if let Some(ceiling) = self.row_ceiling {
            if value.len() > ceiling {
                return Err(StoreError::OversizedWrite {
                    key: key.to_string(),
                    size: value.len(),
                    ceiling,
                });
            }
        }
        self.lock_entries()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock_entries().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.lock_entries().keys().cloned().collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        if self.lock_faults().fail_batch_removes {
            return Err(StoreError::Backend(
                "Simulated batch removal error".to_string(),
            ));
        }
        let mut entries = self.lock_entries();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let backend = MemoryBackend::new();
        backend.set("NOTES", "[]").await.unwrap();
        assert_eq!(backend.get("NOTES").await.unwrap().as_deref(), Some("[]"));

        backend.remove("NOTES").await.unwrap();
        assert_eq!(backend.get("NOTES").await.unwrap(), None);
        // Removing again is not an error.
        backend.remove("NOTES").await.unwrap();
    }

    #[tokio::test]
    async fn row_ceiling_rejects_oversized_values() {
        let backend = MemoryBackend::with_row_ceiling(8);
        backend.set("small", "12345678").await.unwrap();

        let err = backend.set("big", "123456789").await.unwrap_err();
        assert!(err.is_oversized_write());
        assert!(!backend.contains_key("big"));
    }

    #[tokio::test]
    async fn read_faults_heal_after_n_failures() {
        let backend = MemoryBackend::new();
        backend.set("NOTES", "[]").await.unwrap();
        backend.fail_reads_of("NOTES", 1);

        assert!(backend.get("NOTES").await.is_err());
        assert_eq!(backend.get("NOTES").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn remove_many_clears_batch() {
        let backend = MemoryBackend::new();
        backend.set("a", "1").await.unwrap();
        backend.set("b", "2").await.unwrap();
        backend.set("c", "3").await.unwrap();

        backend
            .remove_many(&["a".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(backend.list_keys().await.unwrap(), vec!["b".to_string()]);
    }
}
