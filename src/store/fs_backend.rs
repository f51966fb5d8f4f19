//! File-per-key backend.
//!
//! Production backend for desktop hosts and integration tests: each key maps
//! to one file under a root directory. Writes go to a temp file first and
//! are renamed into place so a crash never leaves a partial row. The row
//! ceiling is enforced here too (default 2 MiB), so a misconfigured chunk
//! size fails the same way it would on device.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use super::backend::KeyValueBackend;
use crate::error::{Result, StoreError};

/// Default per-entry ceiling, matching the ~2 MiB row limit of the mobile
/// backends this crate is designed around.
pub const DEFAULT_ROW_CEILING: usize = 2 * 1024 * 1024;

pub struct FileBackend {
    root: PathBuf,
    row_ceiling: Option<usize>,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            row_ceiling: Some(DEFAULT_ROW_CEILING),
        }
    }

    /// Override the row ceiling. `None` disables the check entirely.
    pub fn with_row_ceiling(mut self, ceiling: Option<usize>) -> Self {
        self.row_ceiling = ceiling;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        if let Some(ceiling) = self.row_ceiling {
            if value.len() > ceiling {
                return Err(StoreError::OversizedWrite {
                    key: key.to_string(),
                    size: value.len(),
                    ceiling,
                });
            }
        }
        self.ensure_root().await?;

        // Atomic write: temp file then rename.
        let tmp = self.root.join(format!(".tmp-{}", Uuid::new_v4()));
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                // Leftover temp files from interrupted writes are not rows.
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        Ok(keys)
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        backend.set("NOTES", "[{\"id\":1}]").await.unwrap();
        assert_eq!(
            backend.get("NOTES").await.unwrap().as_deref(),
            Some("[{\"id\":1}]")
        );

        backend.remove("NOTES").await.unwrap();
        assert_eq!(backend.get("NOTES").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_keys_skips_temp_files() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        backend.set("NOTES", "[]").await.unwrap();
        backend.set("NOTES_meta", "{}").await.unwrap();
        std::fs::write(dir.path().join(".tmp-leftover"), "junk").unwrap();

        let mut keys = backend.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["NOTES".to_string(), "NOTES_meta".to_string()]);
    }

    #[tokio::test]
    async fn row_ceiling_is_enforced() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path()).with_row_ceiling(Some(16));

        let err = backend.set("NOTES", &"x".repeat(17)).await.unwrap_err();
        assert!(err.is_oversized_write());
        assert_eq!(backend.get("NOTES").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hostile_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path());

        assert!(matches!(
            backend.get("../escape").await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            backend.set("", "v").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn missing_root_lists_empty() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("never-created"));
        assert!(backend.list_keys().await.unwrap().is_empty());
    }
}
