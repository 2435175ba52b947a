//! # idcheck-auth: capability-graded identity authenticator dispatch
//!
//! A host registers any number of authenticator services. For each identity
//! application, every running service grades how well it can evaluate it;
//! the best-graded service is selected and validates the application
//! asynchronously, answering valid, invalid or indeterminate.
//!
//! ## Features
//!
//! - **Graded selection**: highest [`Grade`] wins, ties broken by configured
//!   priority, then registration order
//! - **Contained faults**: service errors, panics, timeouts and cancellation
//!   become an `Indeterminate` result with a `Service` error, never a crash
//! - **Explicit registration**: services are registered by the composition
//!   root, there is no runtime discovery
//! - **Idempotent lifecycle**: per-service start/stop with a readiness flag
//!
//! ## Architecture
//!
//! ```text
//!         ┌─────────────────────────────┐
//!         │   IDENTITY APPLICATION      │
//!         │   claims + photos + sink    │
//!         └─────────────────────────────┘
//!                       ↓
//!         ┌─────────────────────────────┐
//!         │   SERVICE REGISTRY          │
//!         │   supports() on candidates  │
//!         │   → best grade wins         │
//!         └─────────────────────────────┘
//!                       ↓
//!         ┌─────────────────────────────┐
//!         │   AUTHENTICATOR SERVICE     │
//!         │   validate() under timeout  │
//!         └─────────────────────────────┘
//!                       ↓
//!       Valid / Invalid / Indeterminate (+ error)
//!              or "no authenticator available"
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use idcheck_auth::{IdentityApplication, ServiceRegistryBuilder};
//! use idcheck_auth::services::TemplateService;
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = ServiceRegistryBuilder::new()
//!     .with_service(TemplateService::new())
//!     .build()?;
//! registry.start_all().await;
//!
//! let application = IdentityApplication::builder()
//!     .claim("FIRST", "Alice")
//!     .build();
//! let outcome = registry.dispatch(&application, &CancellationToken::new()).await;
//! ```

#![warn(missing_docs)]

pub mod application;
pub mod config;
pub mod error;
pub mod grade;
pub mod lifecycle;
pub mod pages;
pub mod registry;
pub mod result;
pub mod service;
pub mod services;

// Re-exports for convenience
pub use application::{
    ApplicationDocument, Claims, ErrorCategory, ErrorLog, ErrorReport, ErrorSink,
    IdentityApplication, IdentityApplicationBuilder, Photo,
};
pub use config::{AppConfig, DispatcherConfig, RequiredClaimsConfig, TemplateConfig};
pub use error::{IdCheckError, Result};
pub use grade::Grade;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use pages::ConfigurablePage;
pub use registry::{
    DispatchOutcome, GradeReport, Selection, ServiceRegistry, ServiceRegistryBuilder,
};
pub use result::{AuthenticationResult, Outcome, ResultError};
pub use service::{is_valid, AuthenticatorService};

/// Re-exported so services and callers share the same cancellation type
pub use tokio_util::sync::CancellationToken;
