//! Core data types: [`Note`] and [`Category`].
//!
//! The storage layer never interprets these; it serializes whole
//! collections to JSON and treats the result as an opaque payload. Field
//! names are camelCase on the wire to match the persisted layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    /// Rich-text body exactly as the editor produced it.
    pub content: String,
    /// Dangling ids are tolerated; the UI shows such notes as uncategorized.
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: String, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            content,
            category_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

/// A user-defined category. Built-in categories live in the UI layer and are
/// never persisted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
}

impl Category {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            color: None,
        }
    }

    pub fn with_color(mut self, color: String) -> Self {
        self.color = Some(color);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_serializes_camel_case() {
        let note = Note::new("Groceries".into(), "milk, eggs".into());
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"categoryId\""));
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("\"category_id\""));
    }

    #[test]
    fn note_round_trips() {
        let note = Note::new("Title".into(), "Body".into()).with_category(Uuid::new_v4());
        let json = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }
}
