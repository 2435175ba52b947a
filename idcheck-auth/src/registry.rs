//! Service Registry - grades, selects and dispatches to authenticator services
//!
//! The registry holds every authenticator service registered by the
//! composition root. For each application it grades the candidates, picks
//! one winner and runs that winner's validation.
//!
//! ## Selection
//!
//! 1. Candidates are the registered services (only the `Running` ones when
//!    `require_running` is set).
//! 2. Each candidate grades the application. A grading fault counts as
//!    `not_at_all` and is recorded on the application's error sink.
//! 3. `not_at_all` candidates are discarded.
//! 4. The highest grade wins. Equal grades go to the lowest priority value,
//!    then to the earliest registration.
//!
//! If no candidate remains the dispatch is `Unsupported` and no validation
//! runs.

use serde::Serialize;
use std::cmp::Reverse;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::{ErrorCategory, ErrorReport, IdentityApplication};
use crate::config::{AppConfig, DispatcherConfig};
use crate::error::{IdCheckError, Result};
use crate::grade::Grade;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::pages::ConfigurablePage;
use crate::result::AuthenticationResult;
use crate::service::{self, AuthenticatorService};
use crate::services::{RequiredClaimsService, TemplateService};

struct ServiceEntry {
    service: Arc<dyn AuthenticatorService>,
    priority: i32,
    lifecycle: Lifecycle,
}

/// Grade a candidate gave an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeReport {
    /// Service name
    pub service: String,

    /// Tie-break priority
    pub priority: i32,

    /// Grade used for selection (`not_at_all` on fault)
    pub grade: Grade,

    /// Grading fault, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The service chosen for an application
#[derive(Clone)]
pub struct Selection {
    /// Selected service
    pub service: Arc<dyn AuthenticatorService>,

    /// Grade it offered
    pub grade: Grade,

    /// Its tie-break priority
    pub priority: i32,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("service", &self.service.name())
            .field("grade", &self.grade)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Result of a dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// A service was selected and validated the application
    Completed {
        /// Selected service
        service: String,
        /// Grade it offered
        grade: Grade,
        /// Its verdict
        result: AuthenticationResult,
    },
    /// No registered service can handle the application
    Unsupported,
}

impl DispatchOutcome {
    /// The validation result, unless the dispatch was unsupported
    pub fn result(&self) -> Option<&AuthenticationResult> {
        match self {
            DispatchOutcome::Completed { result, .. } => Some(result),
            DispatchOutcome::Unsupported => None,
        }
    }

    /// Whether no service could handle the application
    pub fn is_unsupported(&self) -> bool {
        matches!(self, DispatchOutcome::Unsupported)
    }
}

/// Service Registry
///
/// Owns the registered services and their lifecycles for the whole
/// process. Registration happens at startup through `&mut self`; grading,
/// dispatch and lifecycle control only need `&self`, so the registry can
/// be shared behind an `Arc`.
pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
    config: DispatcherConfig,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
        }
    }

    /// Create a registry holding the bundled services enabled in `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut registry = Self::new(config.dispatcher.clone());

        if config.template.enabled {
            registry.register(TemplateService::new())?;
        }

        for service in &config.required_claims {
            registry.register(RequiredClaimsService::from_config(service)?)?;
        }

        Ok(registry)
    }

    /// Dispatcher configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Register a service with its configured priority
    pub fn register<S: AuthenticatorService + 'static>(&mut self, service: S) -> Result<()> {
        self.register_arc(Arc::new(service))
    }

    /// Register a shared service with its configured priority
    pub fn register_arc(&mut self, service: Arc<dyn AuthenticatorService>) -> Result<()> {
        let priority = self.config.priority_of(service.name());
        self.register_with_priority(service, priority)
    }

    /// Register a shared service with an explicit priority
    pub fn register_with_priority(
        &mut self,
        service: Arc<dyn AuthenticatorService>,
        priority: i32,
    ) -> Result<()> {
        if self.contains(service.name()) {
            return Err(IdCheckError::DuplicateService(service.name().to_string()));
        }

        info!(
            service = service.name(),
            description = service.description(),
            priority,
            "Registered authenticator service"
        );

        self.entries.push(ServiceEntry {
            service,
            priority,
            lifecycle: Lifecycle::new(),
        });
        Ok(())
    }

    /// Check if a service is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Names of all registered services, in registration order
    pub fn service_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.service.name().to_string())
            .collect()
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no service is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries.iter().find(|e| e.service.name() == name)
    }

    /// Lifecycle state of a service
    pub fn state(&self, name: &str) -> Option<LifecycleState> {
        self.entry(name).map(|e| e.lifecycle.state())
    }

    /// Readiness flag of a service
    pub fn is_running(&self, name: &str) -> bool {
        self.entry(name)
            .map(|e| e.lifecycle.is_running())
            .unwrap_or(false)
    }

    /// Start one service
    pub async fn start(&self, name: &str) -> Result<LifecycleState> {
        let entry = self
            .entry(name)
            .ok_or_else(|| IdCheckError::UnknownService(name.to_string()))?;
        Ok(entry.lifecycle.start(entry.service.as_ref()).await)
    }

    /// Stop one service
    pub async fn stop(&self, name: &str) -> Result<LifecycleState> {
        let entry = self
            .entry(name)
            .ok_or_else(|| IdCheckError::UnknownService(name.to_string()))?;
        Ok(entry.lifecycle.stop(entry.service.as_ref()).await)
    }

    /// Start every registered service, returning how many are running
    ///
    /// A service that fails to start stays stopped; the others are still
    /// started.
    pub async fn start_all(&self) -> usize {
        let mut running = 0;
        for entry in &self.entries {
            if entry.lifecycle.start(entry.service.as_ref()).await == LifecycleState::Running {
                running += 1;
            }
        }
        running
    }

    /// Stop every registered service, in reverse registration order
    pub async fn stop_all(&self) {
        for entry in self.entries.iter().rev() {
            entry.lifecycle.stop(entry.service.as_ref()).await;
        }
    }

    /// Administration pages of all services, in registration order
    ///
    /// Published regardless of service health.
    pub fn configurable_pages(&self) -> Vec<ConfigurablePage> {
        self.entries
            .iter()
            .flat_map(|e| e.service.configurable_pages())
            .collect()
    }

    fn candidates(&self) -> impl Iterator<Item = &ServiceEntry> {
        let require_running = self.config.require_running;
        self.entries
            .iter()
            .filter(move |e| !require_running || e.lifecycle.is_running())
    }

    /// Grade the application with every candidate, in registration order
    ///
    /// Grading faults are logged and recorded on the application's error
    /// sink, and reported as `not_at_all`.
    pub fn grades(&self, application: &IdentityApplication) -> Vec<GradeReport> {
        self.candidates()
            .map(|entry| {
                let name = entry.service.name();
                match service::grade(entry.service.as_ref(), application) {
                    Ok(grade) => {
                        debug!(service = name, grade = %grade, "Service graded application");
                        GradeReport {
                            service: name.to_string(),
                            priority: entry.priority,
                            grade,
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!(
                            service = name,
                            application = %application.id(),
                            error = %e,
                            "Service failed to grade application"
                        );
                        application.report_error(
                            ErrorReport::new(e.to_string(), ErrorCategory::Service, name)
                                .with_related(serde_json::json!({ "operation": "supports" })),
                        );
                        GradeReport {
                            service: name.to_string(),
                            priority: entry.priority,
                            grade: Grade::NotAtAll,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    }

    /// Select the best-graded service for the application
    ///
    /// Returns `None` if every candidate grades it `not_at_all`.
    pub fn select(&self, application: &IdentityApplication) -> Option<Selection> {
        let grades = self.grades(application);

        let (index, best) = grades
            .iter()
            .enumerate()
            .filter(|(_, report)| report.grade.is_supported())
            .max_by_key(|(index, report)| (report.grade, Reverse(report.priority), Reverse(*index)))?;

        let entry = self.entry(&best.service)?;
        debug!(
            service = %best.service,
            grade = %best.grade,
            position = index,
            "Selected authenticator service"
        );

        Some(Selection {
            service: Arc::clone(&entry.service),
            grade: best.grade,
            priority: best.priority,
        })
    }

    /// Dispatch an application to the best-graded service
    ///
    /// Exactly one service validates the application when any qualifies;
    /// none does otherwise. Faults inside the selected service come back as
    /// an `Indeterminate` result with a `Service` error.
    pub async fn dispatch(
        &self,
        application: &IdentityApplication,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let Some(selection) = self.select(application) else {
            info!(
                application = %application.id(),
                candidates = self.candidates().count(),
                "No authenticator available for application"
            );
            return DispatchOutcome::Unsupported;
        };

        let result = service::is_valid(
            selection.service.as_ref(),
            application,
            cancel,
            self.config.validation_timeout,
        )
        .await;

        info!(
            application = %application.id(),
            service = selection.service.name(),
            grade = %selection.grade,
            outcome = %result.outcome,
            "Application dispatched"
        );

        DispatchOutcome::Completed {
            service: selection.service.name().to_string(),
            grade: selection.grade,
            result,
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

/// Builder for creating a ServiceRegistry with services
pub struct ServiceRegistryBuilder {
    config: DispatcherConfig,
    services: Vec<(Arc<dyn AuthenticatorService>, Option<i32>)>,
}

impl ServiceRegistryBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
            services: Vec::new(),
        }
    }

    /// Use a dispatcher configuration
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a service with its configured priority
    pub fn with_service<S: AuthenticatorService + 'static>(mut self, service: S) -> Self {
        self.services.push((Arc::new(service), None));
        self
    }

    /// Add a service with an explicit priority
    pub fn with_prioritized_service<S: AuthenticatorService + 'static>(
        mut self,
        service: S,
        priority: i32,
    ) -> Self {
        self.services.push((Arc::new(service), Some(priority)));
        self
    }

    /// Build the registry
    ///
    /// Fails if two services share a name.
    pub fn build(self) -> Result<ServiceRegistry> {
        let mut registry = ServiceRegistry::new(self.config);
        for (service, priority) in self.services {
            match priority {
                Some(priority) => registry.register_with_priority(service, priority)?,
                None => registry.register_arc(service)?,
            }
        }
        Ok(registry)
    }
}

impl Default for ServiceRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequiredClaimsConfig;
    use crate::result::Outcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedService {
        name: &'static str,
        grade: Grade,
        validations: AtomicUsize,
    }

    impl FixedService {
        fn new(name: &'static str, grade: Grade) -> Self {
            Self {
                name,
                grade,
                validations: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthenticatorService for FixedService {
        fn name(&self) -> &str {
            self.name
        }

        fn supports(&self, _application: &IdentityApplication) -> Result<Grade> {
            Ok(self.grade)
        }

        async fn validate(
            &self,
            _application: &IdentityApplication,
            _cancel: &CancellationToken,
        ) -> Result<Option<bool>> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            Ok(Some(true))
        }
    }

    fn open_config() -> DispatcherConfig {
        DispatcherConfig {
            require_running: false,
            ..Default::default()
        }
    }

    fn application() -> IdentityApplication {
        IdentityApplication::builder().claim("FIRST", "Alice").build()
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ServiceRegistry::default();
        registry.register(FixedService::new("a", Grade::Ok)).unwrap();

        let err = registry
            .register(FixedService::new("a", Grade::Good))
            .unwrap_err();
        assert!(matches!(err, IdCheckError::DuplicateService(name) if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_highest_grade_wins() {
        let registry = ServiceRegistryBuilder::new()
            .with_config(open_config())
            .with_service(FixedService::new("perhaps", Grade::Perhaps))
            .with_service(FixedService::new("excellent", Grade::Excellent))
            .with_service(FixedService::new("good", Grade::Good))
            .build()
            .unwrap();

        let selection = registry.select(&application()).unwrap();
        assert_eq!(selection.service.name(), "excellent");
        assert_eq!(selection.grade, Grade::Excellent);
    }

    #[test]
    fn test_tie_break_by_priority_then_registration() {
        let registry = ServiceRegistryBuilder::new()
            .with_config(open_config())
            .with_prioritized_service(FixedService::new("first", Grade::Good), 50)
            .with_prioritized_service(FixedService::new("second", Grade::Good), 10)
            .with_prioritized_service(FixedService::new("third", Grade::Good), 10)
            .build()
            .unwrap();

        let selection = registry.select(&application()).unwrap();
        assert_eq!(selection.service.name(), "second");
        assert_eq!(selection.priority, 10);
    }

    #[test]
    fn test_priority_from_config() {
        let mut config = open_config();
        config.priorities.insert("preferred".to_string(), 1);

        let registry = ServiceRegistryBuilder::new()
            .with_config(config)
            .with_service(FixedService::new("default", Grade::Ok))
            .with_service(FixedService::new("preferred", Grade::Ok))
            .build()
            .unwrap();

        assert_eq!(registry.select(&application()).unwrap().service.name(), "preferred");
    }

    #[tokio::test]
    async fn test_stopped_services_are_not_candidates() {
        let registry = ServiceRegistryBuilder::new()
            .with_service(FixedService::new("a", Grade::Good))
            .build()
            .unwrap();

        assert!(registry.select(&application()).is_none());

        registry.start("a").await.unwrap();
        assert!(registry.select(&application()).is_some());

        registry.stop("a").await.unwrap();
        assert!(registry.select(&application()).is_none());
    }

    #[tokio::test]
    async fn test_unknown_service_lifecycle() {
        let registry = ServiceRegistry::default();

        assert!(matches!(
            registry.start("ghost").await,
            Err(IdCheckError::UnknownService(_))
        ));
        assert!(!registry.is_running("ghost"));
        assert_eq!(registry.state("ghost"), None);
    }

    #[tokio::test]
    async fn test_dispatch_runs_exactly_one_validation() {
        let a = Arc::new(FixedService::new("a", Grade::Good));
        let b = Arc::new(FixedService::new("b", Grade::Excellent));

        let mut registry = ServiceRegistry::new(open_config());
        registry.register_arc(a.clone()).unwrap();
        registry.register_arc(b.clone()).unwrap();

        let outcome = registry
            .dispatch(&application(), &CancellationToken::new())
            .await;

        match outcome {
            DispatchOutcome::Completed {
                service,
                grade,
                result,
            } => {
                assert_eq!(service, "b");
                assert_eq!(grade, Grade::Excellent);
                assert_eq!(result.outcome, Outcome::Valid);
            }
            DispatchOutcome::Unsupported => panic!("Expected a completed dispatch"),
        }
        assert_eq!(a.validations.load(Ordering::SeqCst), 0);
        assert_eq!(b.validations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_config_registers_bundled_services() {
        let config = AppConfig {
            required_claims: vec![RequiredClaimsConfig::new("kyc", &["FIRST"])],
            ..Default::default()
        };

        let registry = ServiceRegistry::from_config(&config).unwrap();
        assert_eq!(registry.service_names(), vec!["template", "kyc"]);
        assert_eq!(registry.start_all().await, 2);

        let outcome = registry
            .dispatch(&application(), &CancellationToken::new())
            .await;
        assert_eq!(outcome.result().unwrap().outcome, Outcome::Valid);

        registry.stop_all().await;
        assert_eq!(registry.state("kyc"), Some(LifecycleState::Stopped));
        assert_eq!(registry.configurable_pages().len(), 2);
    }

    #[test]
    fn test_dispatch_outcome_serialization() {
        let json = serde_json::to_value(DispatchOutcome::Unsupported).unwrap();
        assert_eq!(json["status"], "unsupported");
    }
}
