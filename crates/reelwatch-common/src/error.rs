//! Common error types used throughout reelwatch.
//!
//! Most engine paths never surface these to a user: "not found" and timeouts are
//! expected transient states. The type exists so the library client and the
//! state store can report *why* something failed before callers degrade it.

/// Common error type for reelwatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested item was not found.
    #[error("Item not found: {0}")]
    NotFound(String),

    /// A remote HTTP call failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Http error.
    pub fn http<S: Into<String>>(msg: S) -> Self {
        Self::Http(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error describes a transient "not there yet" state rather
    /// than a real failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Http(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("series 42");
        assert_eq!(err.to_string(), "Item not found: series 42");

        let err = Error::http("503 Service Unavailable");
        assert_eq!(err.to_string(), "HTTP error: 503 Service Unavailable");

        let err = Error::invalid_input("empty key");
        assert_eq!(err.to_string(), "Invalid input: empty key");

        let err = Error::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::not_found("x").is_transient());
        assert!(Error::http("timeout").is_transient());
        assert!(!Error::internal("bug").is_transient());
        assert!(!Error::invalid_input("bad").is_transient());
    }
}
