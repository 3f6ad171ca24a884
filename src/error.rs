//! Error types for docportal.

use thiserror::Error;

/// Common error type for docportal.
#[derive(Error, Debug)]
pub enum PortalError {
    /// Persistent store error.
    ///
    /// Constraint violations (unknown parent folder, duplicate login) and
    /// connectivity failures both end up here. Errors from sqlx are
    /// converted automatically.
    #[error("store error: {0}")]
    Store(String),

    /// Copying bytes into the managed storage area failed.
    #[error("transfer error: {0}")]
    Transfer(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for PortalError {
    fn from(e: sqlx::Error) -> Self {
        PortalError::Store(e.to_string())
    }
}

/// Result type alias for docportal operations.
pub type Result<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = PortalError::Store("FOREIGN KEY constraint failed".to_string());
        assert_eq!(err.to_string(), "store error: FOREIGN KEY constraint failed");
    }

    #[test]
    fn test_transfer_error_display() {
        let err = PortalError::Transfer("source unreadable".to_string());
        assert_eq!(err.to_string(), "transfer error: source unreadable");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = PortalError::NotFound("folder".to_string());
        assert_eq!(err.to_string(), "folder not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PortalError = io_err.into();
        assert!(matches!(err, PortalError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: PortalError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, PortalError::Store(_)));
    }
}
