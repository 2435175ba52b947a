//! Identity Application
//!
//! The input of a dispatch: the identity claims an applicant made, the
//! photos they attached, and the error sink validators report faults to.
//! Applications are built by the caller and are read-only afterwards.

use crate::error::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Claims of an application, keyed by claim name
pub type Claims = BTreeMap<String, serde_json::Value>;

/// Category of a reported error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// The application itself is at fault
    Client,
    /// The authenticator service failed internally
    Service,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Client => write!(f, "client"),
            ErrorCategory::Service => write!(f, "service"),
        }
    }
}

/// Photo attached to an application
///
/// The payload is opaque to the dispatcher. In JSON form the bytes are
/// base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// MIME type of the payload, e.g. `image/jpeg`
    pub content_type: String,

    /// Raw photo bytes
    #[serde(with = "base64_bytes")]
    pub data: Bytes,
}

impl Photo {
    /// Create a new photo
    pub fn new(content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Whether the content type is an image type
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

mod base64_bytes {
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// An error recorded against an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Human readable message
    pub message: String,

    /// Claim or photo path the error refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Contextual reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<serde_json::Value>,

    /// Error category
    pub category: ErrorCategory,

    /// Name of the reporting service
    pub reporter: String,

    /// When the error was reported
    pub reported_at: DateTime<Utc>,
}

impl ErrorReport {
    /// Create a new error report
    pub fn new(
        message: impl Into<String>,
        category: ErrorCategory,
        reporter: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            path: None,
            related: None,
            category,
            reporter: reporter.into(),
            reported_at: Utc::now(),
        }
    }

    /// Set the path the error refers to
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach a contextual reference
    pub fn with_related(mut self, related: serde_json::Value) -> Self {
        self.related = Some(related);
        self
    }
}

/// Append-only channel for recording errors against an application
pub trait ErrorSink: Send + Sync {
    /// Record an error
    fn report(&self, report: ErrorReport);
}

/// In-memory error sink
///
/// The default sink of an application. Entries are only ever appended.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<ErrorReport>>,
}

impl ErrorLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded errors, oldest first
    pub fn entries(&self) -> Vec<ErrorReport> {
        self.entries.lock().clone()
    }

    /// Number of recorded errors
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ErrorSink for ErrorLog {
    fn report(&self, report: ErrorReport) {
        self.entries.lock().push(report);
    }
}

/// Identity application submitted for verification
#[derive(Clone)]
pub struct IdentityApplication {
    id: Uuid,
    claims: Claims,
    photos: Vec<Photo>,
    sink: Arc<dyn ErrorSink>,
    log: Option<Arc<ErrorLog>>,
}

impl IdentityApplication {
    /// Create an application with the default in-memory error sink
    pub fn new(claims: Claims, photos: Vec<Photo>) -> Self {
        Self::builder().claims(claims).photos(photos).build()
    }

    /// Start building an application
    pub fn builder() -> IdentityApplicationBuilder {
        IdentityApplicationBuilder::default()
    }

    /// Application identifier, used for log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// All claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Look up a claim
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.get(name)
    }

    /// Look up a claim holding a string
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(|v| v.as_str())
    }

    /// Whether a claim is present
    pub fn has_claim(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// Attached photos, in submission order
    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    /// Number of attached photos
    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }

    /// Record an error against this application
    pub fn report_error(&self, report: ErrorReport) {
        self.sink.report(report);
    }

    /// Errors recorded so far, if the application uses the default sink
    pub fn errors(&self) -> Option<Vec<ErrorReport>> {
        self.log.as_ref().map(|log| log.entries())
    }
}

impl std::fmt::Debug for IdentityApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityApplication")
            .field("id", &self.id)
            .field("claims", &self.claims.keys().collect::<Vec<_>>())
            .field("photos", &self.photos.len())
            .finish()
    }
}

/// Builder for [`IdentityApplication`]
#[derive(Default)]
pub struct IdentityApplicationBuilder {
    id: Option<Uuid>,
    claims: Claims,
    photos: Vec<Photo>,
    sink: Option<Arc<dyn ErrorSink>>,
}

impl IdentityApplicationBuilder {
    /// Use a specific application id
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Add a claim
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// Add several claims
    pub fn claims(mut self, claims: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        self.claims.extend(claims);
        self
    }

    /// Attach a photo
    pub fn photo(mut self, photo: Photo) -> Self {
        self.photos.push(photo);
        self
    }

    /// Attach several photos
    pub fn photos(mut self, photos: impl IntoIterator<Item = Photo>) -> Self {
        self.photos.extend(photos);
        self
    }

    /// Report errors to a caller-supplied sink instead of the default log
    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the application
    pub fn build(self) -> IdentityApplication {
        let (sink, log) = match self.sink {
            Some(sink) => (sink, None),
            None => {
                let log = Arc::new(ErrorLog::new());
                (log.clone() as Arc<dyn ErrorSink>, Some(log))
            }
        };

        IdentityApplication {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            claims: self.claims,
            photos: self.photos,
            sink,
            log,
        }
    }
}

/// Serialized form of an application, as exchanged with the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationDocument {
    /// Application identifier (generated when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    /// Identity claims
    #[serde(default)]
    pub claims: Claims,

    /// Attached photos
    #[serde(default)]
    pub photos: Vec<Photo>,
}

impl ApplicationDocument {
    /// Parse a document from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build an application from the document
    pub fn into_application(self) -> IdentityApplication {
        let mut builder = IdentityApplication::builder()
            .claims(self.claims)
            .photos(self.photos);
        if let Some(id) = self.id {
            builder = builder.id(id);
        }
        builder.build()
    }
}
