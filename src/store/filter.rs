//! Filter evaluation and value ordering for the in-memory store.
//!
//! Supports top-level field equality and the comparison operators
//! `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte` and `$in`.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::Document;
use crate::error::StoreError;

/// Checks that `filter` is a supported filter object.
pub(crate) fn validate(filter: &Value) -> Result<&Map<String, Value>, StoreError> {
    let Some(conditions) = filter.as_object() else {
        return Err(StoreError::InvalidDocument(
            "filter must be an object".to_string(),
        ));
    };
    for (field, condition) in conditions {
        if let Some(ops) = operator_object(condition) {
            for (op, operand) in ops {
                match op.as_str() {
                    "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" => {}
                    "$in" if operand.is_array() => {}
                    "$in" => {
                        return Err(StoreError::InvalidDocument(format!(
                            "$in on '{}' needs an array",
                            field
                        )))
                    }
                    other => {
                        return Err(StoreError::InvalidDocument(format!(
                            "unsupported operator '{}' on '{}'",
                            other, field
                        )))
                    }
                }
            }
        }
    }
    Ok(conditions)
}

/// Whether `document` satisfies every condition of `filter`.
pub fn matches(document: &Document, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(field, condition)| {
        let value = document.get(field).unwrap_or(&Value::Null);
        match operator_object(condition) {
            Some(ops) => ops.iter().all(|(op, operand)| apply(op, value, operand)),
            None => values_equal(value, condition),
        }
    })
}

fn operator_object(condition: &Value) -> Option<&Map<String, Value>> {
    condition
        .as_object()
        .filter(|ops| !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')))
}

fn apply(op: &str, value: &Value, operand: &Value) -> bool {
    match op {
        "$eq" => values_equal(value, operand),
        "$ne" => !values_equal(value, operand),
        "$gt" => same_kind(value, operand) && compare_values(value, operand) == Ordering::Greater,
        "$gte" => same_kind(value, operand) && compare_values(value, operand) != Ordering::Less,
        "$lt" => same_kind(value, operand) && compare_values(value, operand) == Ordering::Less,
        "$lte" => same_kind(value, operand) && compare_values(value, operand) != Ordering::Greater,
        "$in" => operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| values_equal(value, item))),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values used for sorting: values of different
/// types order by type (null first), numbers numerically, strings lexically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ if type_rank(a) != type_rank(b) => type_rank(a).cmp(&type_rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
