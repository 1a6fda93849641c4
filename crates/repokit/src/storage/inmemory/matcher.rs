//! Evaluation of native filter, sort and update documents against stored
//! documents.
//!
//! Supports the operator subset the query builder emits: `$eq`, `$ne`,
//! `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$regex`/`$options`,
//! `$exists`, plus `$and`/`$or` at the top level. RFC 3339 strings compare
//! as instants, so range filters on timestamps work regardless of the
//! fractional-second precision a value was written with.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use regex::RegexBuilder;
use serde_json::Value;

use repokit_core::entity::Document;
use repokit_core::storage::{StoreError, StoreResult};

fn query_failed(message: impl Into<String>) -> StoreError {
    StoreError::QueryFailed(message.into())
}

/// Looks up a possibly dotted field path.
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn as_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Orders two values of compatible types; `None` when they are not
/// comparable.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => match (as_datetime(left), as_datetime(right)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        (Value::Object(_), Value::Object(_)) => left == right,
        _ => compare(left, right) == Some(Ordering::Equal),
    }
}

/// Equality with array-membership semantics: a stored array matches when
/// any element equals the operand.
fn field_equals(stored: Option<&Value>, operand: &Value) -> bool {
    match stored {
        None => operand.is_null(),
        Some(Value::Array(items)) if !operand.is_array() => {
            items.iter().any(|item| equals(item, operand))
        }
        Some(value) => equals(value, operand),
    }
}

fn is_operator_object(condition: &Value) -> bool {
    condition
        .as_object()
        .is_some_and(|map| !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn operand_list<'a>(operator: &str, operand: &'a Value) -> StoreResult<&'a Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| query_failed(format!("{operator} expects an array")))
}

fn match_operators(
    stored: Option<&Value>,
    operators: &serde_json::Map<String, Value>,
) -> StoreResult<bool> {
    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => field_equals(stored, operand),
            "$ne" => !field_equals(stored, operand),
            "$gt" | "$gte" | "$lt" | "$lte" => stored
                .and_then(|value| compare(value, operand))
                .is_some_and(|ordering| match operator.as_str() {
                    "$gt" => ordering == Ordering::Greater,
                    "$gte" => ordering != Ordering::Less,
                    "$lt" => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }),
            "$in" => operand_list(operator, operand)?
                .iter()
                .any(|candidate| field_equals(stored, candidate)),
            "$nin" => !operand_list(operator, operand)?
                .iter()
                .any(|candidate| field_equals(stored, candidate)),
            "$exists" => stored.is_some() == operand.as_bool().unwrap_or(true),
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| query_failed("$regex expects a string"))?;
                let case_insensitive = operators
                    .get("$options")
                    .and_then(Value::as_str)
                    .is_some_and(|options| options.contains('i'));
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(case_insensitive)
                    .build()
                    .map_err(|e| query_failed(format!("invalid $regex: {e}")))?;
                stored
                    .and_then(Value::as_str)
                    .is_some_and(|text| regex.is_match(text))
            }
            "$options" => true,
            other => return Err(query_failed(format!("unsupported operator {other}"))),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(operator: &str, operand: &'a Value) -> StoreResult<Vec<&'a Document>> {
    operand_list(operator, operand)?
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| query_failed(format!("{operator} expects filter objects")))
        })
        .collect()
}

/// Returns true if `document` satisfies `filter`.
pub fn matches(document: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_filters(key, condition)? {
                    if !matches(document, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in sub_filters(key, condition)? {
                    if matches(document, sub)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            field if field.starts_with('$') => {
                return Err(query_failed(format!("unsupported operator {field}")));
            }
            field => {
                let stored = lookup(document, field);
                match condition {
                    Value::Object(operators) if is_operator_object(condition) => {
                        match_operators(stored, operators)?
                    }
                    operand => field_equals(stored, operand),
                }
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Rank of a value's type in sort order: missing/null < bool < number < string < other.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn sort_ordering(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let by_type = type_rank(left).cmp(&type_rank(right));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (left, right) {
        (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Stable sort by a native sort document (`{"field": 1 | -1}`).
pub fn sort_documents(documents: &mut [Document], sort: &Document) -> StoreResult<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort {
        let descending = match direction.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => return Err(query_failed(format!("invalid sort direction for {field}"))),
        };
        keys.push((field.as_str(), descending));
    }

    documents.sort_by(|a, b| {
        for (field, descending) in &keys {
            let ordering = sort_ordering(lookup(a, field), lookup(b, field));
            let ordering = if *descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

/// Applies a `$set` / `$unset` update in place.
pub fn apply_update(document: &mut Document, update: &Document) -> StoreResult<()> {
    for (operator, fields) in update {
        let fields = fields
            .as_object()
            .ok_or_else(|| query_failed(format!("{operator} expects an object")))?;
        match operator.as_str() {
            "$set" => {
                for (field, value) in fields {
                    document.insert(field.clone(), value.clone());
                }
            }
            "$unset" => {
                for field in fields.keys() {
                    document.remove(field);
                }
            }
            other => return Err(query_failed(format!("unsupported update operator {other}"))),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn check(document: &Value, filter: Value) -> bool {
        matches(&doc(document.clone()), &doc(filter)).unwrap()
    }

    #[test]
    fn test_equality_and_missing_fields() {
        let user = json!({ "name": "Alice", "age": 30, "tags": ["a", "b"] });

        assert!(check(&user, json!({ "name": "Alice" })));
        assert!(check(&user, json!({ "age": 30.0 })));
        assert!(!check(&user, json!({ "name": "Bob" })));
        assert!(check(&user, json!({ "nickname": null })));
        assert!(check(&user, json!({ "tags": "b" })));
        assert!(check(&user, json!({})));
    }

    #[test]
    fn test_comparison_operators() {
        let tx = json!({ "amount": 50 });

        assert!(check(&tx, json!({ "amount": { "$gte": 50, "$lt": 100 } })));
        assert!(!check(&tx, json!({ "amount": { "$gt": 50 } })));
        assert!(check(&tx, json!({ "amount": { "$lte": 50 } })));
        assert!(!check(&tx, json!({ "missing": { "$gt": 0 } })));
        assert!(!check(&tx, json!({ "amount": { "$gt": "10" } })));
    }

    #[test]
    fn test_timestamps_compare_as_instants() {
        let booking = json!({ "createdAt": "2024-01-15T10:00:00.000000Z" });

        assert!(check(
            &booking,
            json!({ "createdAt": { "$gte": "2024-01-15T10:00:00Z", "$lte": "2024-01-31T00:00:00+00:00" } })
        ));
        assert!(!check(
            &booking,
            json!({ "createdAt": { "$gt": "2024-01-15T10:00:00Z" } })
        ));
    }

    #[test]
    fn test_set_operators() {
        let tx = json!({ "status": "pending" });

        assert!(check(&tx, json!({ "status": { "$in": ["pending", "failed"] } })));
        assert!(!check(&tx, json!({ "status": { "$nin": ["pending"] } })));
        assert!(check(&tx, json!({ "other": { "$nin": ["x"] } })));
        assert!(check(&tx, json!({ "status": { "$ne": "done" } })));
    }

    #[test]
    fn test_regex_and_exists() {
        let user = json!({ "email": "Alice@Example.com" });

        assert!(check(&user, json!({ "email": { "$regex": "example", "$options": "i" } })));
        assert!(!check(&user, json!({ "email": { "$regex": "example" } })));
        assert!(check(&user, json!({ "email": { "$exists": true } })));
        assert!(check(&user, json!({ "phone": { "$exists": false } })));
    }

    #[test]
    fn test_or_and_and() {
        let user = json!({ "name": "Alice", "email": "a@x.com", "age": 30 });

        assert!(check(
            &user,
            json!({ "$or": [{ "name": "Bob" }, { "email": "a@x.com" }] })
        ));
        assert!(!check(
            &user,
            json!({ "$and": [{ "$or": [{ "name": "Alice" }] }, { "$or": [{ "age": 31 }] }] })
        ));
    }

    #[test]
    fn test_unsupported_operator_fails() {
        let result = matches(
            &doc(json!({ "a": 1 })),
            &doc(json!({ "a": { "$where": "x" } })),
        );
        assert!(matches!(result, Err(StoreError::QueryFailed(_))));
    }

    #[test]
    fn test_sort_is_stable_and_multi_key() {
        let mut documents = vec![
            doc(json!({ "n": 1, "group": "b" })),
            doc(json!({ "n": 2, "group": "a" })),
            doc(json!({ "n": 3, "group": "b" })),
            doc(json!({ "n": 4 })),
        ];

        sort_documents(&mut documents, &doc(json!({ "group": -1 }))).unwrap();
        let order: Vec<i64> = documents.iter().map(|d| d["n"].as_i64().unwrap()).collect();

        assert_eq!(order, vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_apply_update() {
        let mut document = doc(json!({ "name": "Alice", "age": 30 }));

        apply_update(
            &mut document,
            &doc(json!({ "$set": { "name": "Bob" }, "$unset": { "age": "" } })),
        )
        .unwrap();

        assert_eq!(Value::Object(document), json!({ "name": "Bob" }));
    }
}
