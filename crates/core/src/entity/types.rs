use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// A record in the store's native shape: field name to JSON value.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Identity fields every entity carries, whatever its `Field` enum says.
pub const BASE_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// A queryable field of an entity.
///
/// Implemented by a plain enum per entity so that query-builder calls can only
/// name fields the entity actually has.
pub trait Field: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// The field name as stored in documents.
    fn name(self) -> &'static str;

    /// Every variant, used for run-time validation of untyped criteria.
    fn all() -> &'static [Self];

    /// Looks a field up by its stored name.
    fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|field| field.name() == name)
    }
}

/// A domain record managed by a repository.
///
/// The serialized form of `Self` is the stored document. `Draft` is what
/// callers hand to `create` (identity fields optional), `Patch` is what they
/// hand to `update` (every field optional, `None` fields skipped).
pub trait Entity: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Name of the backing collection.
    const COLLECTION: &'static str;

    /// Stored fields left out of `Field`, so they can be read back but never
    /// filtered or sorted on.
    const PRIVATE_FIELDS: &'static [&'static str] = &[];

    type Field: Field;
    type Draft: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;

    fn id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    /// Returns true if `name` can appear in criteria, sorts and pipelines.
    fn is_known_field(name: &str) -> bool {
        BASE_FIELDS.contains(&name) || Self::Field::from_name(name).is_some()
    }

    /// Returns true if `name` is part of the stored document.
    fn is_stored_field(name: &str) -> bool {
        Self::is_known_field(name) || Self::PRIVATE_FIELDS.contains(&name)
    }
}

/// Generates a fresh entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
