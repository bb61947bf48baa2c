//! Query Module
//!
//! Describes read requests against a collection and derives stable cache keys
//! from their shape.

mod key;

pub use key::{CacheKey, KeyCodec};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// == Query Kind ==
/// Result shape of a query: a single optional document or an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    FindOne,
    FindMany,
}

// == Sort ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    /// Parses a sort token, `"year"` ascending and `"-year"` descending.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (field, direction) = match token.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Desc),
            None => (token.strip_prefix('+').unwrap_or(token), SortDirection::Asc),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            direction,
        })
    }
}

// == Query Options ==
/// Execution options of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Sort keys, applied in order
    pub sort: Vec<SortField>,
    /// Maximum number of documents returned, `None` or 0 = unbounded
    pub limit: Option<u64>,
    /// Number of leading documents to skip
    pub skip: Option<u64>,
    /// Fields to keep in returned documents, empty = all fields
    pub projection: Vec<String>,
}

// == Query Spec ==
/// An immutable description of a read against one collection.
///
/// Built with [`QuerySpec::find`], [`QuerySpec::find_one`] or
/// [`QuerySpec::find_by_id`] and refined with the consuming builder methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    collection: String,
    kind: QueryKind,
    filter: Value,
    options: QueryOptions,
}

impl QuerySpec {
    /// A find-many query over `collection` matching `filter`.
    pub fn find(collection: impl Into<String>, filter: Value) -> Self {
        Self::new(collection, QueryKind::FindMany, filter)
    }

    /// A find-one query over `collection` matching `filter`.
    pub fn find_one(collection: impl Into<String>, filter: Value) -> Self {
        Self::new(collection, QueryKind::FindOne, filter)
    }

    /// A find-one query on the `_id` field.
    pub fn find_by_id(collection: impl Into<String>, id: &str) -> Self {
        let mut filter = Map::new();
        filter.insert("_id".to_string(), Value::String(id.to_string()));
        Self::find_one(collection, Value::Object(filter))
    }

    fn new(collection: impl Into<String>, kind: QueryKind, filter: Value) -> Self {
        Self {
            collection: collection.into(),
            kind,
            filter,
            options: QueryOptions::default(),
        }
    }

    /// Appends sort keys from a space separated list such as `"year -standard"`.
    /// Tokens that do not name a field are ignored.
    pub fn sort(mut self, spec: &str) -> Self {
        self.options
            .sort
            .extend(spec.split_whitespace().filter_map(SortField::parse));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Restricts returned documents to the given fields.
    pub fn project<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .projection
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn filter(&self) -> &Value {
        &self.filter
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Derives the cache key for this query.
    pub fn cache_key(&self) -> Result<CacheKey, crate::error::KeyError> {
        KeyCodec::encode(&self.collection, self.kind, &self.filter, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_parses_tokens() {
        let spec = QuerySpec::find("student", json!({})).sort("year -standard");
        assert_eq!(
            spec.options().sort,
            vec![
                SortField {
                    field: "year".to_string(),
                    direction: SortDirection::Asc
                },
                SortField {
                    field: "standard".to_string(),
                    direction: SortDirection::Desc
                },
            ]
        );
    }

    #[test]
    fn test_sort_ignores_empty_tokens() {
        assert!(SortField::parse("-").is_none());
        assert!(SortField::parse("").is_none());
        assert_eq!(SortField::parse("+year").unwrap().direction, SortDirection::Asc);
    }

    #[test]
    fn test_find_by_id_is_find_one() {
        let spec = QuerySpec::find_by_id("teacher", "abc");
        assert_eq!(spec.kind(), QueryKind::FindOne);
        assert_eq!(spec.filter(), &json!({"_id": "abc"}));
        assert_eq!(spec.collection(), "teacher");
    }

    #[test]
    fn test_builder_sets_options() {
        let spec = QuerySpec::find("teacher", json!({"year": 3}))
            .limit(10)
            .skip(2)
            .project(["year"]);
        assert_eq!(spec.options().limit, Some(10));
        assert_eq!(spec.options().skip, Some(2));
        assert_eq!(spec.options().projection, vec!["year".to_string()]);
    }
}
