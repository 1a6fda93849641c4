mod timestamp;
mod types;

pub use timestamp::{format_timestamp, monotonic_now};
pub use types::{
    new_id, Document, Entity, Field, BASE_FIELDS, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD,
};
