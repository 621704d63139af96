//! Error types for directory authentication operations.
//!
//! This module provides the error type hierarchy shared by the adapter
//! crates. The variants follow the failure taxonomy of the adapter: local
//! misconfiguration, bounded-time protocol failures, and the distinct
//! admin-bind failure that must never be conflated with a bad end-user
//! credential.

use thiserror::Error;

/// Main error type for directory authentication operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Operation timed out
    #[error("Timeout waiting for directory: {0}")]
    Timeout(String),

    /// Transport or protocol failure reported by the directory layer
    #[error("Directory protocol error: {0}")]
    Protocol(String),

    /// Directory entry not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Admin bind failed; fatal to the enclosing operation
    #[error("Admin connection unavailable: {0}")]
    AdminUnavailable(String),
}

/// Specialized result type for directory authentication operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::AdminUnavailable(_) => "ADMIN_UNAVAILABLE",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    ///
    /// Admin-bind and protocol failures indicate service misconfiguration or
    /// an unreachable directory, which require operator attention; the other
    /// variants describe per-request outcomes.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::Protocol(_) | Self::AdminUnavailable(_)
        )
    }

    /// Returns true if the error can be recovered locally by the fallback
    /// identity builder during resolution.
    #[must_use]
    pub const fn is_recoverable_lookup_failure(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Protocol(_))
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::ConfigError("test".to_string()).error_code(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            Error::ValidationError("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(Error::Timeout("test".to_string()).error_code(), "TIMEOUT");
        assert_eq!(
            Error::Protocol("test".to_string()).error_code(),
            "PROTOCOL_ERROR"
        );
        assert_eq!(
            Error::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            Error::InvalidRequest("test".to_string()).error_code(),
            "INVALID_REQUEST"
        );
        assert_eq!(
            Error::AdminUnavailable("test".to_string()).error_code(),
            "ADMIN_UNAVAILABLE"
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::AdminUnavailable("bind rejected".to_string());
        assert_eq!(
            err.to_string(),
            "Admin connection unavailable: bind rejected"
        );

        let err = Error::Timeout("search".to_string());
        assert_eq!(err.to_string(), "Timeout waiting for directory: search");
    }

    #[test]
    fn test_should_log() {
        assert!(Error::ConfigError("test".to_string()).should_log());
        assert!(Error::Protocol("test".to_string()).should_log());
        assert!(Error::AdminUnavailable("test".to_string()).should_log());

        assert!(!Error::NotFound("test".to_string()).should_log());
        assert!(!Error::Timeout("test".to_string()).should_log());
        assert!(!Error::InvalidRequest("test".to_string()).should_log());
    }

    #[test]
    fn test_recoverable_lookup_failures() {
        assert!(Error::Timeout("test".to_string()).is_recoverable_lookup_failure());
        assert!(Error::Protocol("test".to_string()).is_recoverable_lookup_failure());

        assert!(!Error::AdminUnavailable("test".to_string()).is_recoverable_lookup_failure());
        assert!(!Error::ConfigError("test".to_string()).is_recoverable_lookup_failure());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let core_err: Error = err.into();
        assert!(matches!(core_err, Error::ConfigError(_)));
    }

    #[test]
    fn test_error_clone_and_eq() {
        let err1 = Error::NotFound("entry".to_string());
        let err2 = err1.clone();
        let err3 = Error::NotFound("other".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
