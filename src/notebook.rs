//! The domain store: notes and categories, persisted as whole snapshots.
//!
//! [`Notebook`] is the only caller of the storage layer. Loading runs the
//! resilience ladder: integrity check, chunked read, recovery, and as the
//! last resort a complete reset. Every mutation snapshots the previous
//! committed collection to its backup key, then persists the new snapshot
//! through the chunked store.
//!
//! The load path, per key family:
//!
//! ```text
//! Start → CheckIntegrity ─ corrupt ──→ PerformCompleteReset → ReadyEmpty
//!              │ ok
//!              ▼
//!        ReadViaChunkedStore ─ found+parses ──→ Ready
//!              │ null / parse failure          │ oversized-row error
//!              │ / read error                  ▼
//!        AttemptRecovery               PerformCompleteReset → ReadyEmpty
//!          │ recovered │ nothing
//!          ▼           ▼
//!        Ready       ReadyEmpty
//! ```
//!
//! The whole sequence is retried exactly once, after a fixed delay, if it
//! errors; the storage layer itself never retries.

use std::sync::Arc;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::model::{Category, Note};
use crate::store::{
    ChunkedStore, EmergencyCleanup, KeyValueBackend, Recovery, StorageStats, CATEGORIES_KEY,
    NOTES_KEY,
};

pub struct Notebook<B: KeyValueBackend> {
    store: ChunkedStore<B>,
    recovery: Recovery<B>,
    cleanup: EmergencyCleanup<B>,
    config: StoreConfig,
    notes: Vec<Note>,
    categories: Vec<Category>,
    loaded: bool,
}

impl<B: KeyValueBackend> Notebook<B> {
    pub fn new(backend: Arc<B>, config: StoreConfig) -> Self {
        let store = ChunkedStore::new(Arc::clone(&backend), config.clone());
        let recovery = Recovery::new(store.clone());
        let cleanup = EmergencyCleanup::new(backend, config.clone());
        Self {
            store,
            recovery,
            cleanup,
            config,
            notes: Vec::new(),
            categories: Vec::new(),
            loaded: false,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn note(&self, id: &Uuid) -> Option<&Note> {
        self.notes.iter().find(|n| &n.id == id)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub async fn storage_stats(&self) -> Result<StorageStats> {
        self.store.storage_stats().await
    }

    /// Load both collections, retrying the whole sequence once after a fixed
    /// delay if the first attempt errors.
    pub async fn load(&mut self) -> Result<()> {
        match self.load_once().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("load failed ({e}); retrying once");
                sleep(self.config.load_retry_delay).await;
                self.load_once().await
            }
        }
    }

    async fn load_once(&mut self) -> Result<()> {
        if !self.cleanup.check_data_integrity().await {
            warn!("integrity check failed; resetting storage");
            self.cleanup.perform_complete_reset().await?;
            self.notes = Vec::new();
            self.categories = Vec::new();
            self.loaded = true;
            return Ok(());
        }

        self.notes = self.load_collection(NOTES_KEY).await?;
        self.categories = self.load_collection(CATEGORIES_KEY).await?;
        self.loaded = true;
        Ok(())
    }

    async fn load_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.store.get_item(key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(items) => return Ok(items),
                Err(e) => warn!("stored '{key}' does not parse: {e}"),
            },
            Ok(None) => debug!("no stored value for '{key}'"),
            Err(e) if e.is_oversized_write() => {
                // A row the chunking layer should have kept below the
                // ceiling still blew it: the chunking invariant itself is
                // broken, not the read. Recovery cannot help here.
                warn!("oversized row reading '{key}'; resetting storage");
                self.cleanup.perform_complete_reset().await?;
                return Ok(Vec::new());
            }
            // Any other read exception is a transient problem the recovery
            // ladder may still get around.
            Err(e) => warn!("reading '{key}' failed: {e}"),
        }

        match self.recovery.attempt_recovery(key).await {
            Some(value) => match serde_json::from_value(value) {
                Ok(items) => Ok(items),
                Err(e) => {
                    warn!("recovered value for '{key}' has the wrong shape: {e}");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    pub async fn add_note(&mut self, note: Note) -> Result<()> {
        let previous = self.notes.clone();
        self.notes.push(note);
        self.persist_notes(previous).await
    }

    pub async fn update_note(&mut self, mut note: Note) -> Result<()> {
        let Some(pos) = self.notes.iter().position(|n| n.id == note.id) else {
            return Err(StoreError::NoteNotFound(note.id));
        };
        let previous = self.notes.clone();
        note.updated_at = chrono::Utc::now();
        self.notes[pos] = note;
        self.persist_notes(previous).await
    }

    /// Remove a note. Its backup snapshot stays behind; backups die only in
    /// an emergency cleanup.
    pub async fn remove_note(&mut self, id: &Uuid) -> Result<()> {
        let Some(pos) = self.notes.iter().position(|n| &n.id == id) else {
            return Err(StoreError::NoteNotFound(*id));
        };
        let previous = self.notes.clone();
        self.notes.remove(pos);
        self.persist_notes(previous).await
    }

    pub async fn add_category(&mut self, category: Category) -> Result<()> {
        let previous = self.categories.clone();
        self.categories.push(category);
        self.persist_categories(previous).await
    }

    /// Remove a category. Notes pointing at it keep their dangling id; the
    /// UI shows them as uncategorized.
    pub async fn remove_category(&mut self, id: &Uuid) -> Result<()> {
        let Some(pos) = self.categories.iter().position(|c| &c.id == id) else {
            return Err(StoreError::CategoryNotFound(*id));
        };
        let previous = self.categories.clone();
        self.categories.remove(pos);
        self.persist_categories(previous).await
    }

    async fn persist_notes(&mut self, previous: Vec<Note>) -> Result<()> {
        self.recovery.create_backup(NOTES_KEY, &previous).await;
        match self.store.set_item(NOTES_KEY, &self.notes).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_oversized_write() => self.reset_after_oversized(NOTES_KEY, e).await,
            Err(e) => {
                self.notes = previous;
                Err(e)
            }
        }
    }

    async fn persist_categories(&mut self, previous: Vec<Category>) -> Result<()> {
        self.recovery.create_backup(CATEGORIES_KEY, &previous).await;
        match self.store.set_item(CATEGORIES_KEY, &self.categories).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_oversized_write() => self.reset_after_oversized(CATEGORIES_KEY, e).await,
            Err(e) => {
                self.categories = previous;
                Err(e)
            }
        }
    }

    /// An oversized single row means the chunk size is not actually below
    /// the backend ceiling. Per the error policy the user ends up with an
    /// empty, working store rather than a crash loop.
    async fn reset_after_oversized(&mut self, key: &str, cause: StoreError) -> Result<()> {
        warn!("oversized write persisting '{key}' ({cause}); resetting storage");
        self.cleanup.perform_complete_reset().await?;
        self.notes = Vec::new();
        self.categories = Vec::new();
        Ok(())
    }
}
