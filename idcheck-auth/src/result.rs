//! Authentication Result
//!
//! The tri-state outcome of validating an identity application, plus the
//! error detail when the validating service could not finish its own logic.

use crate::application::ErrorCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Claims and photos satisfy the service's acceptance rules
    Valid,
    /// Claims or photos violate the service's acceptance rules
    Invalid,
    /// The service could not reach a decision
    Indeterminate,
}

impl From<Option<bool>> for Outcome {
    fn from(decision: Option<bool>) -> Self {
        match decision {
            Some(true) => Outcome::Valid,
            Some(false) => Outcome::Invalid,
            None => Outcome::Indeterminate,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Valid => write!(f, "valid"),
            Outcome::Invalid => write!(f, "invalid"),
            Outcome::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Error detail attached to a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultError {
    /// Error category
    pub category: ErrorCategory,

    /// Fault message
    pub message: String,
}

/// Authentication Result
///
/// `error` is present only when the outcome came from a fault inside the
/// service, never when the service answered "no".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    /// Validation outcome
    pub outcome: Outcome,

    /// Error detail, if the service failed to answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,

    /// Service that produced the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Timestamp of validation
    pub verified_at: DateTime<Utc>,
}

impl AuthenticationResult {
    fn with_outcome(outcome: Outcome, error: Option<ResultError>) -> Self {
        Self {
            outcome,
            error,
            service: None,
            verified_at: Utc::now(),
        }
    }

    /// Create a result from a service decision
    pub fn from_decision(decision: Option<bool>) -> Self {
        Self::with_outcome(decision.into(), None)
    }

    /// Create an indeterminate result for a service fault
    pub fn service_error(message: impl Into<String>) -> Self {
        Self::error(ErrorCategory::Service, message)
    }

    /// Create an indeterminate result carrying an error
    pub fn error(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::with_outcome(
            Outcome::Indeterminate,
            Some(ResultError {
                category,
                message: message.into(),
            }),
        )
    }

    /// Record which service produced the result
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Whether the application was accepted
    pub fn is_valid(&self) -> bool {
        self.outcome == Outcome::Valid
    }

    /// Whether the service failed to answer
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
