//! Error types for cache operations

use thiserror::Error;

/// Main error type for all cache operations
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Key absent, or present but expired
    #[error("key not found: {0}")]
    NotFound(String),

    /// Operation attempted after dispose()
    #[error("cache is disposed")]
    Disposed,

    /// Serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Underlying filesystem collaborator failed
    #[error("io error: {0}")]
    Io(String),

    /// The data-protection collaborator rejected a protect/unprotect call
    #[error("encryption error: {0}")]
    Encryption(String),

    /// The HTTP collaborator returned a non-success status, timed out, or failed transport
    #[error("http error: {0}")]
    Http(String),

    /// Internal error (in-flight request failed without a result, executor shut down, ...)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::NotFound("test_key".to_string());
        assert_eq!(err.to_string(), "key not found: test_key");

        let err = CacheError::Disposed;
        assert_eq!(err.to_string(), "cache is disposed");
    }

    #[test]
    fn test_error_clone() {
        let err = CacheError::Disposed;
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
