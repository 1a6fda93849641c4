use thiserror::Error;

use super::SerializationError;

/// Errors that can occur during cache operations.
///
/// The cache layer never surfaces these to repository callers; a failing
/// backend degrades to reading straight from the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<SerializationError> for CacheError {
    fn from(error: SerializationError) -> Self {
        CacheError::Serialization(error.to_string())
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_display() {
        let error = CacheError::ConnectionFailed("timeout".to_string());
        assert_eq!(error.to_string(), "Cache connection failed: timeout");
    }

    #[test]
    fn test_operation_failed_display() {
        let error = CacheError::OperationFailed("READONLY".to_string());
        assert_eq!(error.to_string(), "Cache operation failed: READONLY");
    }

    #[test]
    fn test_from_serialization_error() {
        let error: CacheError = SerializationError::DeserializeFailed("eof".to_string()).into();
        assert_eq!(
            error,
            CacheError::Serialization("Failed to deserialize: eof".to_string())
        );
    }
}
