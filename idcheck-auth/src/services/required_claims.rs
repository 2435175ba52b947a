//! Required-Claims Authenticator Service
//!
//! A configurable service that accepts applications whose claims have the
//! expected shape:
//!
//! - **Grading**: `not_at_all` if a required claim is missing, `perhaps` if
//!   the claims are there but there are too few photos, otherwise the
//!   configured grade.
//! - **Validation**: invalid if any configured pattern rejects a claim,
//!   indeterminate if a required claim is not a scalar, otherwise valid.

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::IdentityApplication;
use crate::config::RequiredClaimsConfig;
use crate::error::Result;
use crate::grade::Grade;
use crate::pages::ConfigurablePage;
use crate::service::AuthenticatorService;

/// Privilege administrators need to open a required-claims settings page
pub const REQUIRED_PRIVILEGE: &str = "Admin.Identity.RequiredClaims";

/// Required-claims authenticator service
pub struct RequiredClaimsService {
    name: String,
    required: Vec<String>,
    patterns: Vec<(String, Regex)>,
    min_photos: usize,
    grade: Grade,
}

impl RequiredClaimsService {
    /// Create a service from its configuration
    ///
    /// Fails with a configuration error if a pattern does not compile.
    pub fn from_config(config: &RequiredClaimsConfig) -> Result<Self> {
        let patterns = config
            .patterns
            .iter()
            .map(|(claim, pattern)| -> Result<(String, Regex)> {
                Ok((claim.clone(), Regex::new(pattern)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            required: config.required.clone(),
            patterns,
            min_photos: config.min_photos,
            grade: config.grade,
        })
    }

    fn claim_text(value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl AuthenticatorService for RequiredClaimsService {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "required-claims identity authenticator"
    }

    fn supports(&self, application: &IdentityApplication) -> Result<Grade> {
        if let Some(missing) = self.required.iter().find(|c| !application.has_claim(c)) {
            debug!(service = %self.name, claim = %missing, "Required claim missing");
            return Ok(Grade::NotAtAll);
        }

        let images = application.photos().iter().filter(|p| p.is_image()).count();
        if images < self.min_photos {
            return Ok(Grade::Perhaps);
        }

        Ok(self.grade)
    }

    async fn validate(
        &self,
        application: &IdentityApplication,
        _cancel: &CancellationToken,
    ) -> Result<Option<bool>> {
        for claim in &self.required {
            match application.claim(claim).and_then(Self::claim_text) {
                Some(text) if !text.trim().is_empty() => {}
                _ => {
                    debug!(service = %self.name, claim = %claim, "Claim cannot be evaluated");
                    return Ok(None);
                }
            }
        }

        for (claim, pattern) in &self.patterns {
            let Some(value) = application.claim(claim) else {
                continue;
            };
            let matches = Self::claim_text(value)
                .map(|text| pattern.is_match(&text))
                .unwrap_or(false);
            if !matches {
                debug!(service = %self.name, claim = %claim, "Claim rejected by pattern");
                return Ok(Some(false));
            }
        }

        Ok(Some(true))
    }

    fn configurable_pages(&self) -> Vec<ConfigurablePage> {
        vec![ConfigurablePage::new(
            format!("Identity Authenticator ({})", self.name),
            format!("/RequiredClaims/{}.md", self.name),
            REQUIRED_PRIVILEGE,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Photo;
    use crate::error::IdCheckError;

    fn passport() -> RequiredClaimsService {
        RequiredClaimsService::from_config(
            &RequiredClaimsConfig::new("passport", &["FIRST", "LAST", "PNR"])
                .with_pattern("PNR", r"^\d{8}-\d{4}$")
                .with_min_photos(1)
                .with_grade(Grade::Good),
        )
        .unwrap()
    }

    fn application(pnr: serde_json::Value, photos: usize) -> IdentityApplication {
        IdentityApplication::builder()
            .claim("FIRST", "Alice")
            .claim("LAST", "Liddell")
            .claim("PNR", pnr)
            .photos((0..photos).map(|_| Photo::new("image/jpeg", vec![0xff, 0xd8])))
            .build()
    }

    #[test]
    fn test_grading_by_shape() {
        let service = passport();

        let missing = IdentityApplication::builder().claim("FIRST", "Alice").build();
        assert_eq!(service.supports(&missing).unwrap(), Grade::NotAtAll);

        let no_photo = application("19900101-1234".into(), 0);
        assert_eq!(service.supports(&no_photo).unwrap(), Grade::Perhaps);

        let complete = application("19900101-1234".into(), 1);
        assert_eq!(service.supports(&complete).unwrap(), Grade::Good);
    }

    #[test]
    fn test_non_image_attachments_do_not_count() {
        let service = passport();
        let app = IdentityApplication::builder()
            .claim("FIRST", "Alice")
            .claim("LAST", "Liddell")
            .claim("PNR", "19900101-1234")
            .photo(Photo::new("application/pdf", vec![0x25, 0x50]))
            .build();

        assert_eq!(service.supports(&app).unwrap(), Grade::Perhaps);
    }

    #[tokio::test]
    async fn test_validation_outcomes() {
        let service = passport();
        let cancel = CancellationToken::new();

        let valid = application("19900101-1234".into(), 1);
        assert_eq!(service.validate(&valid, &cancel).await.unwrap(), Some(true));

        let invalid = application("not-a-number".into(), 1);
        assert_eq!(service.validate(&invalid, &cancel).await.unwrap(), Some(false));

        let structured = application(serde_json::json!({ "nested": true }), 1);
        assert_eq!(service.validate(&structured, &cancel).await.unwrap(), None);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let result = RequiredClaimsService::from_config(
            &RequiredClaimsConfig::new("broken", &["FIRST"]).with_pattern("FIRST", "(unclosed"),
        );

        assert!(matches!(result, Err(IdCheckError::Config(_))));
    }

    #[test]
    fn test_page_per_service() {
        let pages = passport().configurable_pages();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "/RequiredClaims/passport.md");
        assert_eq!(pages[0].required_privilege, REQUIRED_PRIVILEGE);
    }
}
