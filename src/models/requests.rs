//! Request DTOs for the entity API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::store::Document;

/// Request body for creating (POST) or updating (PATCH) a student or teacher.
///
/// Absent fields are left out of the stored document, so a PATCH only
/// touches the fields it names.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityRequest {
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub standard: Option<i64>,
}

impl EntityRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.year.is_some_and(|y| y < 0) {
            return Some("year cannot be negative".to_string());
        }
        if self.standard.is_some_and(|s| s < 0) {
            return Some("standard cannot be negative".to_string());
        }
        None
    }

    /// Validates a PATCH body, which must change at least one field.
    pub fn validate_patch(&self) -> Option<String> {
        if self.year.is_none() && self.standard.is_none() {
            return Some("update must set year or standard".to_string());
        }
        self.validate()
    }

    /// Fields of the request as a document.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        if let Some(year) = self.year {
            document.insert("year".to_string(), Value::from(year));
        }
        if let Some(standard) = self.standard {
            document.insert("standard".to_string(), Value::from(standard));
        }
        document
    }
}
