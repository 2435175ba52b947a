//! Template Authenticator Service
//!
//! Starting point for new authenticator services. It never claims support
//! for an application and never reaches a decision, but it publishes an
//! administration page and takes part in the lifecycle like a real service.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::IdentityApplication;
use crate::error::Result;
use crate::grade::Grade;
use crate::pages::ConfigurablePage;
use crate::service::AuthenticatorService;

/// Privilege administrators need to open the template's settings page
pub const REQUIRED_PRIVILEGE: &str = "Admin.Identity.Template";

/// Template authenticator service
pub struct TemplateService;

impl TemplateService {
    /// Service name used for registration
    pub const NAME: &'static str = "template";

    /// Create a new template service
    pub fn new() -> Self {
        Self
    }
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthenticatorService for TemplateService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "template identity authenticator"
    }

    fn supports(&self, _application: &IdentityApplication) -> Result<Grade> {
        Ok(Grade::NotAtAll)
    }

    async fn validate(
        &self,
        _application: &IdentityApplication,
        _cancel: &CancellationToken,
    ) -> Result<Option<bool>> {
        Ok(None)
    }

    fn configurable_pages(&self) -> Vec<ConfigurablePage> {
        vec![ConfigurablePage::new(
            "Identity Authenticator Template",
            "/TemplateIdentity/IdentityTemplate.md",
            REQUIRED_PRIVILEGE,
        )]
    }

    async fn on_start(&self) -> Result<()> {
        debug!("Template identity authenticator started");
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        debug!("Template identity authenticator stopped");
        Ok(())
    }
}
