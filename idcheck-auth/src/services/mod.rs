//! Authenticator services bundled with idcheck

pub mod required_claims;
pub mod template;

pub use required_claims::RequiredClaimsService;
pub use template::TemplateService;
