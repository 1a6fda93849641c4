mod error;
mod mapping;
mod traits;
mod validation;

pub use error::{RepositoryError, Result, StoreError, StoreResult, ValidationError};
pub use mapping::{
    from_document, id_filter, ids_filter, prepare_insert, prepare_update, to_document,
    unknown_fields,
};
pub use traits::{DocumentStore, Repository, UpdateOptions};
pub use validation::{validate_criteria, validate_id, validate_pipeline, validate_sort};
