//! Error types for idcheck

/// Result type for idcheck operations
pub type Result<T> = std::result::Result<T, IdCheckError>;

/// idcheck-specific errors
///
/// These are the faults an authenticator service or the registry can
/// raise internally. They never reach the caller of a dispatch directly:
/// the registry folds them into an [`AuthenticationResult`] or an error
/// sink entry.
///
/// [`AuthenticationResult`]: crate::result::AuthenticationResult
#[derive(Debug, thiserror::Error)]
pub enum IdCheckError {
    /// Internal fault inside an authenticator service
    #[error("{0}")]
    Service(String),

    /// Application is malformed or missing data the service relies on
    #[error("Invalid application: {0}")]
    InvalidApplication(String),

    /// Validation was cancelled by the caller
    #[error("Validation cancelled")]
    Cancelled,

    /// Validation did not finish within the configured timeout
    #[error("Validation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Service failed to start or stop
    #[error("Lifecycle error in service '{service}': {reason}")]
    Lifecycle {
        /// Service that failed
        service: String,
        /// Failure description
        reason: String,
    },

    /// A service with the same name is already registered
    #[error("Service '{0}' is already registered")]
    DuplicateService(String),

    /// Unknown service name
    #[error("Service '{0}' is not registered")]
    UnknownService(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IdCheckError {
    /// Shorthand for a service fault with the given message
    pub fn service(message: impl Into<String>) -> Self {
        IdCheckError::Service(message.into())
    }

    /// Check if the error was caused by the caller giving up rather than by
    /// the service itself
    pub fn is_abandoned(&self) -> bool {
        matches!(self, IdCheckError::Cancelled | IdCheckError::Timeout(_))
    }
}

// Conversions from common error types
impl From<serde_json::Error> for IdCheckError {
    fn from(err: serde_json::Error) -> Self {
        IdCheckError::InvalidApplication(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for IdCheckError {
    fn from(err: toml::de::Error) -> Self {
        IdCheckError::Config(format!("Failed to parse config: {}", err))
    }
}

impl From<regex::Error> for IdCheckError {
    fn from(err: regex::Error) -> Self {
        IdCheckError::Config(format!("Invalid claim pattern: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_service_error_message_is_preserved() {
        let err = IdCheckError::service("upstream registry unreachable");
        assert_eq!(err.to_string(), "upstream registry unreachable");
    }

    #[test]
    fn test_abandoned_errors() {
        assert!(IdCheckError::Cancelled.is_abandoned());
        assert!(IdCheckError::Timeout(Duration::from_secs(1)).is_abandoned());
        assert!(!IdCheckError::service("boom").is_abandoned());
    }

    #[test]
    fn test_toml_error_maps_to_config() {
        let err: IdCheckError = toml::from_str::<toml::Value>("not = [valid")
            .unwrap_err()
            .into();
        assert!(matches!(err, IdCheckError::Config(_)));
    }
}
