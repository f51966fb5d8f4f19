use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Row too big: value for '{key}' is {size} bytes, backend ceiling is {ceiling}")]
    OversizedWrite {
        key: String,
        size: usize,
        ceiling: usize,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid key '{0}': keys may only contain [A-Za-z0-9_-]")]
    InvalidKey(String),

    #[error("Note not found: {0}")]
    NoteNotFound(Uuid),

    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the backend rejected a single row for exceeding its size
    /// ceiling. Host-provided backends that cannot construct
    /// [`StoreError::OversizedWrite`] signal the same condition with a
    /// "Row too big" substring in the message, so both shapes are accepted.
    pub fn is_oversized_write(&self) -> bool {
        match self {
            StoreError::OversizedWrite { .. } => true,
            StoreError::Backend(msg) => msg.contains("Row too big"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
