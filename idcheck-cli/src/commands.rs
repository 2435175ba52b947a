//! CLI command implementations
//!
//! Each command builds the service registry from configuration (this is the
//! composition root: services are registered explicitly here), runs its
//! operation and stops the services again.

use anyhow::{bail, Context, Result};
use idcheck_auth::{
    AppConfig, ApplicationDocument, CancellationToken, ConfigurablePage, DispatchOutcome,
    GradeReport, IdentityApplication, ServiceRegistry,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Load configuration, falling back to defaults without a config file
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig> {
    match config_path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            debug!("No configuration file given, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load an application document from a JSON file
pub fn load_application(path: &Path) -> Result<IdentityApplication> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read application {}", path.display()))?;
    let document = ApplicationDocument::from_json(&content)
        .with_context(|| format!("Failed to parse application {}", path.display()))?;

    Ok(document.into_application())
}

async fn start_registry(config: &AppConfig) -> Result<ServiceRegistry> {
    let registry =
        ServiceRegistry::from_config(config).context("Failed to register authenticator services")?;

    let running = registry.start_all().await;
    info!(
        registered = registry.len(),
        running, "Authenticator services started"
    );
    if running < registry.len() {
        warn!("Some authenticator services failed to start");
    }

    Ok(registry)
}

/// Execute the dispatch command
///
/// # Arguments
/// * `config_path` - Optional configuration file
/// * `application_path` - Application document (JSON)
/// * `timeout_secs` - Optional validation timeout override
pub async fn execute_dispatch(
    config_path: Option<PathBuf>,
    application_path: PathBuf,
    timeout_secs: Option<u64>,
) -> Result<DispatchOutcome> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(secs) = timeout_secs {
        if secs == 0 {
            bail!("--timeout must be greater than zero");
        }
        config.dispatcher.validation_timeout = Duration::from_secs(secs);
    }

    let application = load_application(&application_path)?;
    let registry = start_registry(&config).await?;

    // Ctrl-C abandons the validation cleanly
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling validation");
                cancel.cancel();
            }
        })
    };

    let outcome = registry.dispatch(&application, &cancel).await;
    watcher.abort();

    if let Some(errors) = application.errors() {
        for error in errors {
            warn!(
                reporter = %error.reporter,
                category = %error.category,
                message = %error.message,
                "Error recorded on application"
            );
        }
    }

    registry.stop_all().await;
    Ok(outcome)
}

/// Execute the grades command
pub async fn execute_grades(
    config_path: Option<PathBuf>,
    application_path: PathBuf,
) -> Result<Vec<GradeReport>> {
    let config = load_config(config_path.as_deref())?;
    let application = load_application(&application_path)?;
    let registry = start_registry(&config).await?;

    let grades = registry.grades(&application);

    registry.stop_all().await;
    Ok(grades)
}

/// Execute the pages command
///
/// Pages are static, so the services are not started.
pub fn execute_pages(config_path: Option<PathBuf>) -> Result<Vec<ConfigurablePage>> {
    let config = load_config(config_path.as_deref())?;
    let registry =
        ServiceRegistry::from_config(&config).context("Failed to register authenticator services")?;

    Ok(registry.configurable_pages())
}
