//! Configuration for the dispatcher and the bundled services

use crate::error::{IdCheckError, Result};
use crate::grade::Grade;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Priority given to services without a configured priority
pub const DEFAULT_PRIORITY: i32 = 100;

/// Default time a selected service gets to validate an application
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Template service configuration
    #[serde(default)]
    pub template: TemplateConfig,
    /// Required-claims services, one per table
    #[serde(default)]
    pub required_claims: Vec<RequiredClaimsConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IdCheckError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.validation_timeout.is_zero() {
            return Err(IdCheckError::Config(
                "dispatcher.validation_timeout must be greater than zero".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for service in &self.required_claims {
            if service.name.trim().is_empty() {
                return Err(IdCheckError::Config(
                    "required_claims.name must not be empty".to_string(),
                ));
            }
            if !names.insert(service.name.as_str()) {
                return Err(IdCheckError::Config(format!(
                    "required_claims service '{}' is configured twice",
                    service.name
                )));
            }
        }

        Ok(())
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Time a selected service gets to validate an application
    #[serde(with = "humantime_serde")]
    pub validation_timeout: Duration,

    /// Only consider services whose lifecycle is `Running`
    pub require_running: bool,

    /// Tie-break priority per service name; the lowest value wins among
    /// services offering the same grade
    pub priorities: BTreeMap<String, i32>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
            require_running: true,
            priorities: BTreeMap::new(),
        }
    }
}

impl DispatcherConfig {
    /// Configured priority of a service
    pub fn priority_of(&self, service: &str) -> i32 {
        self.priorities
            .get(service)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }
}

/// Template service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Register the template service
    pub enabled: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Required-claims service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredClaimsConfig {
    /// Service name
    pub name: String,

    /// Claims that must be present for the service to grade the
    /// application above `not_at_all`
    #[serde(default)]
    pub required: Vec<String>,

    /// Regular expressions claim values must match, keyed by claim name
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,

    /// Minimum number of image attachments
    #[serde(default)]
    pub min_photos: usize,

    /// Grade offered when the application has the expected shape
    #[serde(default = "RequiredClaimsConfig::default_grade")]
    pub grade: Grade,
}

impl RequiredClaimsConfig {
    fn default_grade() -> Grade {
        Grade::Ok
    }

    /// Create a configuration requiring the given claims
    pub fn new(name: impl Into<String>, required: &[&str]) -> Self {
        Self {
            name: name.into(),
            required: required.iter().map(|c| c.to_string()).collect(),
            patterns: BTreeMap::new(),
            min_photos: 0,
            grade: Self::default_grade(),
        }
    }

    /// Require a claim to match a pattern
    pub fn with_pattern(mut self, claim: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.patterns.insert(claim.into(), pattern.into());
        self
    }

    /// Require a minimum number of photos
    pub fn with_min_photos(mut self, min_photos: usize) -> Self {
        self.min_photos = min_photos;
        self
    }

    /// Set the offered grade
    pub fn with_grade(mut self, grade: Grade) -> Self {
        self.grade = grade;
        self
    }
}
