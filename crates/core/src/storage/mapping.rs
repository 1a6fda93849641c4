//! Conversions between entities and stored documents.

use serde::Serialize;
use serde_json::{json, Value};

use crate::entity::{
    format_timestamp, monotonic_now, new_id, Document, Entity, CREATED_AT_FIELD, ID_FIELD,
    UPDATED_AT_FIELD,
};

use super::{StoreError, ValidationError};

fn to_object<V: Serialize>(value: &V) -> Result<Document, ValidationError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(ValidationError::InvalidInput(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(ValidationError::InvalidInput(e.to_string())),
    }
}

fn is_missing(document: &Document, field: &str) -> bool {
    matches!(document.get(field), None | Some(Value::Null))
}

/// Builds the document to insert for a draft, filling identity fields that
/// are absent.
pub fn prepare_insert<T: Entity>(draft: &T::Draft) -> Result<Document, ValidationError> {
    let mut document = to_object(draft)?;
    let now = Value::String(format_timestamp(monotonic_now()));

    if is_missing(&document, ID_FIELD) {
        document.insert(ID_FIELD.to_string(), Value::String(new_id()));
    }
    for field in [CREATED_AT_FIELD, UPDATED_AT_FIELD] {
        if is_missing(&document, field) {
            document.insert(field.to_string(), now.clone());
        }
    }
    Ok(document)
}

/// Builds a `$set` update for a patch.
///
/// `null` fields are left untouched, identity fields cannot be patched, and
/// `updatedAt` is always refreshed.
pub fn prepare_update<T: Entity>(patch: &T::Patch) -> Result<Document, ValidationError> {
    let mut fields = to_object(patch)?;
    fields.retain(|field, value| {
        !value.is_null() && field != ID_FIELD && field != CREATED_AT_FIELD
    });
    fields.insert(
        UPDATED_AT_FIELD.to_string(),
        Value::String(format_timestamp(monotonic_now())),
    );

    let mut update = Document::new();
    update.insert("$set".to_string(), Value::Object(fields));
    Ok(update)
}

/// Fields of a stored document that `T` does not declare.
pub fn unknown_fields<T: Entity>(document: &Document) -> Vec<String> {
    document
        .keys()
        .filter(|field| !T::is_stored_field(field))
        .cloned()
        .collect()
}

/// Maps a stored document to `T`. Fields `T` does not declare are dropped.
pub fn from_document<T: Entity>(mut document: Document) -> Result<T, StoreError> {
    document.retain(|field, _| T::is_stored_field(field));
    serde_json::from_value(Value::Object(document)).map_err(|e| StoreError::InvalidDocument {
        collection: T::COLLECTION.to_string(),
        reason: e.to_string(),
    })
}

/// Serializes an entity back to its stored shape.
pub fn to_document<T: Entity>(entity: &T) -> Result<Document, StoreError> {
    to_object(entity).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn id_filter(id: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    filter
}

pub fn ids_filter(ids: &[String]) -> Document {
    let mut filter = Document::new();
    filter.insert(ID_FIELD.to_string(), json!({ "$in": ids }));
    filter
}
