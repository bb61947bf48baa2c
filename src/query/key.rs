//! Cache Key Module
//!
//! Canonicalizes a query shape and turns it into a stable cache key.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Number, Value};
use sha2::{Digest, Sha256};

use super::{QueryKind, QueryOptions, SortField};
use crate::error::KeyError;

// == Cache Key ==
/// Stable identity of a query within its collection namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    canonical: String,
    digest: String,
}

impl CacheKey {
    /// Collection namespace the key belongs to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Canonical JSON text of the query shape.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Hex SHA-256 of the canonical text, used as the field inside the namespace.
    pub fn field(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, &self.digest[..12])
    }
}

// == Key Codec ==
/// Pure, deterministic query-shape serializer.
pub struct KeyCodec;

impl KeyCodec {
    /// Encodes a query shape into a [`CacheKey`].
    ///
    /// Object keys are ordered lexicographically at every depth, integral
    /// floats collapse to integers, projections are sorted and deduplicated,
    /// and a zero limit is treated as no limit. Sort order stays as given
    /// since it changes the result.
    pub fn encode(
        collection: &str,
        kind: QueryKind,
        filter: &Value,
        options: &QueryOptions,
    ) -> Result<CacheKey, KeyError> {
        if collection.is_empty() {
            return Err(KeyError::EmptyCollection);
        }
        if !filter.is_object() {
            return Err(KeyError::FilterNotObject(type_name(filter)));
        }

        let options = canonical_options(options)?;
        let document = json!({
            "collection": collection,
            "kind": kind,
            "filter": filter,
            "options": options,
        });
        let canonical = serde_json::to_string(&canonical_value(&document))
            .map_err(|e| KeyError::Serialize(e.to_string()))?;
        let digest = hex::encode(Sha256::digest(canonical.as_bytes()));

        Ok(CacheKey {
            namespace: collection.to_string(),
            canonical,
            digest,
        })
    }
}

fn canonical_options(options: &QueryOptions) -> Result<Value, KeyError> {
    let mut sort: Vec<&SortField> = Vec::with_capacity(options.sort.len());
    for field in &options.sort {
        match sort.iter().find(|s| s.field == field.field) {
            Some(seen) if seen.direction != field.direction => {
                return Err(KeyError::ConflictingSort(field.field.clone()));
            }
            Some(_) => {}
            None => sort.push(field),
        }
    }

    let mut projection: Vec<&str> = options.projection.iter().map(String::as_str).collect();
    projection.sort_unstable();
    projection.dedup();

    Ok(json!({
        "sort": sort,
        "limit": options.limit.filter(|&l| l > 0),
        "skip": options.skip.filter(|&s| s > 0),
        "projection": projection,
    }))
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonical_value(v))).collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Number(n) => Value::Number(canonical_number(n)),
        other => other.clone(),
    }
}

fn canonical_number(n: &Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n.clone();
    }
    match n.as_f64() {
        Some(f) if f.fract() != 0.0 => n.clone(),
        Some(f) if f >= i64::MIN as f64 && f < i64::MAX as f64 => Number::from(f as i64),
        // Integral floats past i64 range still fit a u64 up to 2^64
        Some(f) if f >= 0.0 && f < u64::MAX as f64 => Number::from(f as u64),
        _ => n.clone(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QuerySpec;

    fn key(spec: &QuerySpec) -> CacheKey {
        spec.cache_key().unwrap()
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"year": 3, "standard": 7}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"standard": 7, "year": 3}"#).unwrap();
        assert_eq!(
            key(&QuerySpec::find("student", a)),
            key(&QuerySpec::find("student", b))
        );
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let a = json!({"year": {"$gte": 1, "$lt": 5}});
        let b: Value = serde_json::from_str(r#"{"year": {"$lt": 5, "$gte": 1}}"#).unwrap();
        assert_eq!(
            key(&QuerySpec::find("student", a)).canonical(),
            key(&QuerySpec::find("student", b)).canonical()
        );
    }

    #[test]
    fn test_integral_floats_collapse() {
        let a = json!({"year": 5});
        let b = json!({"year": 5.0});
        assert_eq!(
            key(&QuerySpec::find("student", a)),
            key(&QuerySpec::find("student", b))
        );
        assert_ne!(
            key(&QuerySpec::find("student", json!({"year": 5.5}))),
            key(&QuerySpec::find("student", json!({"year": 5})))
        );
    }

    #[test]
    fn test_large_integral_floats_collapse_to_u64() {
        let int = key(&QuerySpec::find("student", json!({"n": 10_000_000_000_000_000_000u64})));
        let float = key(&QuerySpec::find("student", json!({"n": 1e19})));
        assert_eq!(int, float);

        // 2^63 is the first value past i64
        let int = key(&QuerySpec::find("student", json!({"n": 9_223_372_036_854_775_808u64})));
        let float = key(&QuerySpec::find("student", json!({"n": 9.223372036854775808e18})));
        assert_eq!(int, float);
    }

    #[test]
    fn test_string_and_number_stay_distinct() {
        assert_ne!(
            key(&QuerySpec::find("student", json!({"year": "5"}))),
            key(&QuerySpec::find("student", json!({"year": 5})))
        );
    }

    #[test]
    fn test_kind_and_collection_separate_keys() {
        let many = key(&QuerySpec::find("student", json!({})));
        let one = key(&QuerySpec::find_one("student", json!({})));
        let other = key(&QuerySpec::find("teacher", json!({})));
        assert_ne!(many, one);
        assert_ne!(many.field(), other.field());
        assert_eq!(other.namespace(), "teacher");
    }

    #[test]
    fn test_sort_order_is_significant() {
        let a = QuerySpec::find("student", json!({})).sort("year standard");
        let b = QuerySpec::find("student", json!({})).sort("standard year");
        assert_ne!(key(&a), key(&b));
    }

    #[test]
    fn test_projection_is_a_set() {
        let a = QuerySpec::find("student", json!({})).project(["year", "standard", "year"]);
        let b = QuerySpec::find("student", json!({})).project(["standard", "year"]);
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_zero_limit_means_unbounded() {
        let a = QuerySpec::find("student", json!({})).limit(0);
        let b = QuerySpec::find("student", json!({}));
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_duplicate_sort_same_direction_is_collapsed() {
        let a = QuerySpec::find("student", json!({})).sort("year year");
        let b = QuerySpec::find("student", json!({})).sort("year");
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn test_conflicting_sort_fails() {
        let spec = QuerySpec::find("student", json!({})).sort("year -year");
        assert_eq!(
            spec.cache_key(),
            Err(KeyError::ConflictingSort("year".to_string()))
        );
    }

    #[test]
    fn test_non_object_filter_fails() {
        let spec = QuerySpec::find("student", json!([1, 2]));
        assert_eq!(spec.cache_key(), Err(KeyError::FilterNotObject("array")));
    }

    #[test]
    fn test_empty_collection_fails() {
        let spec = QuerySpec::find("", json!({}));
        assert_eq!(spec.cache_key(), Err(KeyError::EmptyCollection));
    }

    #[test]
    fn test_encoding_is_byte_identical() {
        let spec = QuerySpec::find("student", json!({"b": [3, {"z": 1, "a": 2}], "a": null}))
            .sort("year")
            .limit(10);
        let first = key(&spec);
        let second = key(&spec);
        assert_eq!(first.canonical(), second.canonical());
        assert_eq!(first.field().len(), 64);
        assert!(first.to_string().starts_with("student:"));
    }
}
