//! Entity models stored in the document store and served by the API.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::Document;

// == Entity ==
/// A document type bound to one collection.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection, and cache namespace, holding this entity.
    const COLLECTION: &'static str;

    /// Decodes a stored document.
    fn from_document(document: Document) -> Result<Self, StoreError> {
        serde_json::from_value(Value::Object(document)).map_err(|e| {
            StoreError::Malformed(format!("{}: {}", Self::COLLECTION, e))
        })
    }
}

/// A student record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub year: Option<i64>,
    pub standard: Option<i64>,
}

impl Entity for Student {
    const COLLECTION: &'static str = "student";
}

/// A teacher record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub year: Option<i64>,
    pub standard: Option<i64>,
}

impl Entity for Teacher {
    const COLLECTION: &'static str = "teacher";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_student_from_document() {
        let id = Uuid::new_v4();
        let document = json!({"_id": id.to_string(), "year": 2, "standard": 5})
            .as_object()
            .cloned()
            .unwrap();

        let student = Student::from_document(document).unwrap();
        assert_eq!(
            student,
            Student {
                id,
                year: Some(2),
                standard: Some(5)
            }
        );
    }

    #[test]
    fn test_missing_fields_are_none() {
        let id = Uuid::new_v4();
        let document = json!({"_id": id.to_string()}).as_object().cloned().unwrap();

        let teacher = Teacher::from_document(document).unwrap();
        assert_eq!(teacher.year, None);
        assert_eq!(teacher.standard, None);
    }

    #[test]
    fn test_malformed_document() {
        let document = json!({"_id": "not-a-uuid"}).as_object().cloned().unwrap();
        assert!(matches!(
            Student::from_document(document),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_serializes_id_as_underscore_id() {
        let student = Student {
            id: Uuid::nil(),
            year: Some(1),
            standard: None,
        };
        let value = serde_json::to_value(&student).unwrap();
        assert_eq!(value["_id"], json!(Uuid::nil().to_string()));
    }
}
