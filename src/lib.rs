//! # Notevault Architecture
//!
//! Notevault is the **persistence core of a note-taking app**: a resilience
//! wrapper around a key-value backend that enforces a hard per-entry size
//! limit. The UI, rich-text editing, export, and i18n live elsewhere and
//! consume this crate only through the [`Notebook`] contract.
//!
//! ## The Four-Layer Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Domain Layer (notebook.rs)                                 │
//! │  - Notes and categories as whole snapshots                  │
//! │  - Load ladder: integrity → read → recovery → reset         │
//! │  - Backup before every destructive overwrite                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Resilience Layer (store/recovery.rs, store/cleanup.rs)     │
//! │  - Recovery: direct → chunked → backup, first parse wins    │
//! │  - EmergencyCleanup: integrity check and the full reset     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Chunking Layer (store/chunked.rs)                          │
//! │  - Splits oversized records into bounded physical rows      │
//! │  - Exactly one representation per key, metadata written last│
//! │  - Per-key write locks serialize overlapping writers        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Backend Layer (store/backend.rs)                           │
//! │  - Abstract KeyValueBackend trait, host-provided on device  │
//! │  - FileBackend (desktop), MemoryBackend (tests)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Policy
//!
//! Read-path failures collapse into "not found" wherever a fallback exists:
//! a missing chunk, a corrupt row, or a failed read lands in recovery, and
//! unrecoverable corruption ends in an empty but working store, never a
//! crash. Write-path failures propagate: silently dropping a write would be
//! worse than a visible error. The one exception is the oversized-row
//! signal, which means the chunking invariant itself is broken and is
//! answered with a full reset.
//!
//! ## Module Overview
//!
//! - [`notebook`]: The domain store, the entry point for applications
//! - [`store`]: Chunking, recovery, cleanup, and the backend abstraction
//! - [`model`]: Core data types ([`Note`], [`Category`])
//! - [`config`]: Tuning knobs ([`StoreConfig`])
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod model;
pub mod notebook;
pub mod store;

pub use config::{StoreConfig, DEFAULT_CHUNK_SIZE};
pub use error::{Result, StoreError};
pub use model::{Category, Note};
pub use notebook::Notebook;
pub use store::{
    ChunkMeta, ChunkedStore, EmergencyCleanup, FileBackend, KeyValueBackend, MemoryBackend,
    Recovery, StorageStats, CATEGORIES_KEY, NOTES_KEY,
};
