//! Aggregation pipeline evaluation for the in-memory store.

use serde_json::{Number, Value};

use repokit_core::entity::Document;
use repokit_core::storage::{StoreError, StoreResult};

use super::matcher::{matches, sort_documents};

fn stage_error(message: impl Into<String>) -> StoreError {
    StoreError::QueryFailed(message.into())
}

fn field_reference(value: &Value) -> Option<&str> {
    value.as_str().and_then(|s| s.strip_prefix('$'))
}

#[derive(Debug, Default)]
struct Sum {
    int: i64,
    float: f64,
    is_float: bool,
}

impl Sum {
    fn add(&mut self, value: &Value) {
        if let Some(n) = value.as_i64() {
            self.int = self.int.saturating_add(n);
        } else if let Some(f) = value.as_f64() {
            self.float += f;
            self.is_float = true;
        }
    }

    fn into_value(self) -> Value {
        if self.is_float {
            Number::from_f64(self.float + self.int as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        } else {
            Value::from(self.int)
        }
    }
}

enum Operand {
    Constant(Value),
    Field(String),
}

fn group(documents: Vec<Document>, spec: &Document) -> StoreResult<Vec<Document>> {
    let key_field = match spec.get("_id") {
        Some(Value::Null) | None => None,
        Some(value) => Some(
            field_reference(value)
                .ok_or_else(|| stage_error("$group _id must be null or a field reference"))?
                .to_string(),
        ),
    };

    let mut accumulators: Vec<(&str, Operand)> = Vec::new();
    for (output, accumulator) in spec.iter().filter(|(name, _)| name.as_str() != "_id") {
        let operand = accumulator
            .get("$sum")
            .ok_or_else(|| stage_error(format!("unsupported accumulator for {output}")))?;
        let operand = match field_reference(operand) {
            Some(field) => Operand::Field(field.to_string()),
            None => Operand::Constant(operand.clone()),
        };
        accumulators.push((output.as_str(), operand));
    }

    // Groups keep first-seen order.
    let mut groups: Vec<(Value, Vec<Sum>)> = Vec::new();
    for document in &documents {
        let key = key_field
            .as_deref()
            .and_then(|field| document.get(field).cloned())
            .unwrap_or(Value::Null);
        let index = match groups.iter().position(|(existing, _)| *existing == key) {
            Some(index) => index,
            None => {
                groups.push((key, accumulators.iter().map(|_| Sum::default()).collect()));
                groups.len() - 1
            }
        };
        for ((_, operand), sum) in accumulators.iter().zip(groups[index].1.iter_mut()) {
            match operand {
                Operand::Constant(value) => sum.add(value),
                Operand::Field(field) => {
                    if let Some(value) = document.get(field) {
                        sum.add(value);
                    }
                }
            }
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, sums)| {
            let mut out = Document::new();
            out.insert("_id".to_string(), key);
            for ((output, _), sum) in accumulators.iter().zip(sums) {
                out.insert(output.to_string(), sum.into_value());
            }
            out
        })
        .collect())
}

fn as_count(stage: &str, value: &Value) -> StoreResult<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| stage_error(format!("{stage} expects a non-negative integer")))
}

/// Runs `stages` over `documents`.
///
/// `$count` yields no document when nothing reaches it, matching the
/// behavior of document databases.
pub fn run(mut documents: Vec<Document>, stages: &[Document]) -> StoreResult<Vec<Document>> {
    for stage in stages {
        let mut entries = stage.iter();
        let (name, body) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(stage_error("each stage must have exactly one operator")),
        };

        documents = match name.as_str() {
            "$match" => {
                let filter = body
                    .as_object()
                    .ok_or_else(|| stage_error("$match expects an object"))?;
                let mut kept = Vec::with_capacity(documents.len());
                for document in documents {
                    if matches(&document, filter)? {
                        kept.push(document);
                    }
                }
                kept
            }
            "$sort" => {
                let sort = body
                    .as_object()
                    .ok_or_else(|| stage_error("$sort expects an object"))?;
                sort_documents(&mut documents, sort)?;
                documents
            }
            "$skip" => documents.into_iter().skip(as_count(name, body)?).collect(),
            "$limit" => documents.into_iter().take(as_count(name, body)?).collect(),
            "$count" => {
                let output = body
                    .as_str()
                    .ok_or_else(|| stage_error("$count expects a field name"))?;
                if documents.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(output.to_string(), Value::from(documents.len()));
                    vec![out]
                }
            }
            "$group" => {
                let spec = body
                    .as_object()
                    .ok_or_else(|| stage_error("$group expects an object"))?;
                group(documents, spec)?
            }
            other => return Err(stage_error(format!("unsupported stage {other}"))),
        };
    }
    Ok(documents)
}
