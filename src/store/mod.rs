//! # Storage Layer
//!
//! A resilience wrapper around a key-value backend that enforces a hard
//! per-entry size limit. Three components stack on top of the raw backend:
//!
//! 1. [`ChunkedStore`]: splits logical records larger than the configured
//!    chunk size into numbered physical chunks plus a metadata record, and
//!    reassembles them on read. Callers never see the chunking.
//! 2. [`Recovery`]: best-effort reconstruction when the primary read fails:
//!    direct read, chunk reconstruction, then the backup snapshot. Also
//!    writes the pre-overwrite backups those snapshots come from.
//! 3. [`EmergencyCleanup`]: a parse-only integrity check over the critical
//!    keys, and the nuclear option: delete every trace of the critical key
//!    families and re-initialize empty defaults.
//!
//! ## Physical key layout
//!
//! For a logical key `NOTES`:
//!
//! ```text
//! NOTES              direct JSON payload, if it fits in one row
//! NOTES_chunk_{i}    i-th slice of the serialized payload
//! NOTES_meta         {"chunked":true,"totalChunks":n,"originalSize":len}
//! NOTES_backup*      previous snapshot, one level down (may itself chunk)
//! ```
//!
//! A logical key is stored in exactly one representation at a time: direct
//! or chunked, never both. Every write path removes the other representation
//! before the new one becomes visible, and writes metadata last (chunked
//! case) or removes it first (direct case) so a reader can never observe
//! metadata pointing at absent chunks.
//!
//! ## Backends
//!
//! - [`MemoryBackend`]: hashmap-backed, with a configurable row ceiling and
//!   fault injection for tests.
//! - [`FileBackend`]: one file per key, atomic writes, enforced row ceiling.
//!   Lets desktop hosts and integration tests reproduce the mobile backend's
//!   failure mode.

pub mod backend;
pub mod chunked;
pub mod cleanup;
pub mod fs_backend;
pub mod mem_backend;
pub mod recovery;

pub use backend::KeyValueBackend;
pub use chunked::{ChunkMeta, ChunkedStore, StorageStats};
pub use cleanup::EmergencyCleanup;
pub use fs_backend::FileBackend;
pub use mem_backend::MemoryBackend;
pub use recovery::Recovery;

/// Logical key for the notes collection.
pub const NOTES_KEY: &str = "NOTES";

/// Logical key for the custom-category collection.
pub const CATEGORIES_KEY: &str = "CATEGORIES";

/// Key families validated by the integrity check and wiped by an emergency
/// reset.
pub const CRITICAL_KEYS: [&str; 2] = [NOTES_KEY, CATEGORIES_KEY];

/// Physical key of the `index`-th chunk of `key`.
pub fn chunk_key(key: &str, index: usize) -> String {
    format!("{key}_chunk_{index}")
}

/// Physical key of the chunk metadata record for `key`.
pub fn meta_key(key: &str) -> String {
    format!("{key}_meta")
}

/// Logical key of the pre-overwrite backup snapshot for `key`.
pub fn backup_key(key: &str) -> String {
    format!("{key}_backup")
}

/// True if `physical` belongs to the key family rooted at `base`: the base
/// key itself, its chunks and metadata, and its backup family.
pub(crate) fn in_family(physical: &str, base: &str) -> bool {
    physical == base
        || physical
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('_'))
}

/// Convenience for wiping every physical record of `keys`' families.
pub(crate) fn family_members(all_keys: &[String], bases: &[&str]) -> Vec<String> {
    all_keys
        .iter()
        .filter(|k| bases.iter().any(|base| in_family(k, base)))
        .cloned()
        .collect()
}
