//! Authenticator Service contract
//!
//! An authenticator service grades identity applications and validates the
//! ones it is selected for. Services are registered explicitly with a
//! [`ServiceRegistry`](crate::registry::ServiceRegistry) and live for the
//! whole process; they must not keep per-application state, since the same
//! service may validate many applications concurrently.

use crate::application::IdentityApplication;
use crate::error::{IdCheckError, Result};
use crate::grade::Grade;
use crate::pages::ConfigurablePage;
use crate::result::AuthenticationResult;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Trait for authenticator services
#[async_trait]
pub trait AuthenticatorService: Send + Sync {
    /// Unique service name, used for registration, logging and error
    /// reporting
    fn name(&self) -> &str;

    /// Get a description of this service (for logging)
    fn description(&self) -> &str {
        "authenticator service"
    }

    /// Grade how well this service can evaluate the application
    ///
    /// Must be a pure function of the application's shape: no I/O, no
    /// mutation. Return `Grade::NotAtAll` when the application is outside
    /// the service's capabilities. An `Err` is a fault and excludes the
    /// service from selection.
    fn supports(&self, application: &IdentityApplication) -> Result<Grade>;

    /// Decide on the application
    ///
    /// # Returns
    /// * `Ok(Some(true))` - the application is valid
    /// * `Ok(Some(false))` - the application is invalid
    /// * `Ok(None)` - not enough evidence to decide
    /// * `Err(_)` - the service failed internally
    ///
    /// Long-running work should observe `cancel`.
    async fn validate(
        &self,
        application: &IdentityApplication,
        cancel: &CancellationToken,
    ) -> Result<Option<bool>>;

    /// Administration pages this service publishes
    fn configurable_pages(&self) -> Vec<ConfigurablePage> {
        Vec::new()
    }

    /// Called when the service is started
    async fn on_start(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the service is stopped
    async fn on_stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Validate an application with `service`, containing every fault
///
/// Faults, panics, cancellation and timeouts all become an
/// `Indeterminate` result with a `Service` error. Nothing escapes.
pub async fn is_valid(
    service: &dyn AuthenticatorService,
    application: &IdentityApplication,
    cancel: &CancellationToken,
    timeout: Duration,
) -> AuthenticationResult {
    let validation = AssertUnwindSafe(service.validate(application, cancel)).catch_unwind();

    let decision = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IdCheckError::Cancelled),
        outcome = tokio::time::timeout(timeout, validation) => match outcome {
            Ok(Ok(decision)) => decision,
            Ok(Err(panic)) => Err(IdCheckError::Service(panic_message(panic))),
            Err(_) => Err(IdCheckError::Timeout(timeout)),
        },
    };

    match decision {
        Ok(decision) => {
            let result = AuthenticationResult::from_decision(decision).with_service(service.name());
            debug!(
                service = service.name(),
                application = %application.id(),
                outcome = %result.outcome,
                "Validation completed"
            );
            result
        }
        Err(e) if e.is_abandoned() => {
            info!(
                service = service.name(),
                application = %application.id(),
                error = %e,
                "Validation abandoned"
            );
            AuthenticationResult::service_error(e.to_string()).with_service(service.name())
        }
        Err(e) => {
            warn!(
                service = service.name(),
                application = %application.id(),
                error = %e,
                "Validation failed"
            );
            AuthenticationResult::service_error(e.to_string()).with_service(service.name())
        }
    }
}

/// Grade an application with `service`, turning panics into faults
pub(crate) fn grade(
    service: &dyn AuthenticatorService,
    application: &IdentityApplication,
) -> Result<Grade> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| service.supports(application))) {
        Ok(grade) => grade,
        Err(panic) => Err(IdCheckError::Service(panic_message(panic))),
    }
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "service panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ErrorCategory;
    use crate::result::Outcome;

    enum Behaviour {
        Decide(Option<bool>),
        Fail(&'static str),
        Panic,
        Hang,
    }

    struct ScriptedService {
        behaviour: Behaviour,
    }

    #[async_trait]
    impl AuthenticatorService for ScriptedService {
        fn name(&self) -> &str {
            "scripted"
        }

        fn supports(&self, _application: &IdentityApplication) -> Result<Grade> {
            match self.behaviour {
                Behaviour::Panic => panic!("grading exploded"),
                _ => Ok(Grade::Ok),
            }
        }

        async fn validate(
            &self,
            _application: &IdentityApplication,
            _cancel: &CancellationToken,
        ) -> Result<Option<bool>> {
            match self.behaviour {
                Behaviour::Decide(decision) => Ok(decision),
                Behaviour::Fail(message) => Err(IdCheckError::service(message)),
                Behaviour::Panic => panic!("validation exploded"),
                Behaviour::Hang => {
                    std::future::pending::<()>().await;
                    Ok(None)
                }
            }
        }
    }

    fn application() -> IdentityApplication {
        IdentityApplication::builder().claim("FIRST", "Alice").build()
    }

    async fn run(behaviour: Behaviour, cancel: &CancellationToken) -> AuthenticationResult {
        let service = ScriptedService { behaviour };
        is_valid(&service, &application(), cancel, Duration::from_millis(200)).await
    }

    #[tokio::test]
    async fn test_decisions_map_to_outcomes() {
        let cancel = CancellationToken::new();

        let valid = run(Behaviour::Decide(Some(true)), &cancel).await;
        assert_eq!(valid.outcome, Outcome::Valid);
        assert!(valid.error.is_none());
        assert_eq!(valid.service.as_deref(), Some("scripted"));

        let invalid = run(Behaviour::Decide(Some(false)), &cancel).await;
        assert_eq!(invalid.outcome, Outcome::Invalid);
        assert!(invalid.error.is_none());

        let unknown = run(Behaviour::Decide(None), &cancel).await;
        assert_eq!(unknown.outcome, Outcome::Indeterminate);
        assert!(unknown.error.is_none());
    }

    #[tokio::test]
    async fn test_fault_becomes_service_error() {
        let result = run(Behaviour::Fail("parser choked"), &CancellationToken::new()).await;

        assert_eq!(result.outcome, Outcome::Indeterminate);
        let error = result.error.unwrap();
        assert_eq!(error.category, ErrorCategory::Service);
        assert_eq!(error.message, "parser choked");
    }

    #[tokio::test]
    async fn test_panic_becomes_service_error() {
        let result = run(Behaviour::Panic, &CancellationToken::new()).await;

        assert_eq!(result.outcome, Outcome::Indeterminate);
        assert_eq!(result.error.unwrap().message, "validation exploded");
    }

    #[tokio::test]
    async fn test_timeout_becomes_service_error() {
        let result = run(Behaviour::Hang, &CancellationToken::new()).await;

        assert_eq!(result.outcome, Outcome::Indeterminate);
        let error = result.error.unwrap();
        assert_eq!(error.category, ErrorCategory::Service);
        assert!(error.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancellation_becomes_service_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run(Behaviour::Hang, &cancel).await;

        assert_eq!(result.outcome, Outcome::Indeterminate);
        assert_eq!(result.error.unwrap().message, "Validation cancelled");
    }

    #[test]
    fn test_grade_contains_panics() {
        let service = ScriptedService {
            behaviour: Behaviour::Panic,
        };

        let err = grade(&service, &application()).unwrap_err();
        assert_eq!(err.to_string(), "grading exploded");
    }
}
