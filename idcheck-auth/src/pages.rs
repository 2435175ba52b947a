//! Administration pages published by authenticator services

use serde::{Deserialize, Serialize};

/// A page through which an administrator configures a service
///
/// Rendering and privilege enforcement belong to the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigurablePage {
    /// Display title
    pub title: String,

    /// Resource path of the page
    pub path: String,

    /// Privilege an administrator needs to open the page
    pub required_privilege: String,
}

impl ConfigurablePage {
    /// Create a new page descriptor
    pub fn new(
        title: impl Into<String>,
        path: impl Into<String>,
        required_privilege: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            required_privilege: required_privilege.into(),
        }
    }
}
