use thiserror::Error;

/// Caller mistakes, rejected before the store is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown field for {entity}: {field}")]
    UnknownField { entity: &'static str, field: String },
    #[error("Invalid pagination: limit must be greater than zero")]
    InvalidLimit,
    #[error("Invalid pagination: page must be 1 or greater")]
    InvalidPage,
    #[error("Invalid regex for {field}: {reason}")]
    InvalidRegex { field: String, reason: String },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failures reported by the document store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("{collection} already exists: {id}")]
    DuplicateKey { collection: String, id: String },
    #[error("Invalid document in {collection}: {reason}")]
    InvalidDocument { collection: String, reason: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by repository operations.
///
/// Absence is never an error: lookups return `Ok(None)`, deletes `Ok(false)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RepositoryError {
    pub fn is_validation(&self) -> bool {
        matches!(self, RepositoryError::Validation(_))
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Result type for document store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
