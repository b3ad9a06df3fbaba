use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use coffer_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Kind of audited file operation.
///
/// Tags the reading code does not know are kept verbatim in [`Self::Other`]
/// so that logs written by newer producers still decode and re-encode intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AuditEventType {
    /// A file was stored.
    Upload,
    /// A stored file was read back.
    Download,
    /// Any tag outside the known set.
    Other(String),
}

impl AuditEventType {
    /// Returns the stable storage value for this event type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Upload => "UPLOAD",
            Self::Download => "DOWNLOAD",
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Returns whether the event type creates a stored object.
    #[must_use]
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Upload)
    }
}

impl From<&str> for AuditEventType {
    fn from(value: &str) -> Self {
        match value {
            "UPLOAD" => Self::Upload,
            "DOWNLOAD" => Self::Download,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for AuditEventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "UPLOAD" => Self::Upload,
            "DOWNLOAD" => Self::Download,
            _ => Self::Other(value),
        }
    }
}

impl From<AuditEventType> for String {
    fn from(value: AuditEventType) -> Self {
        match value {
            AuditEventType::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl Display for AuditEventType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One immutable audit fact about a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Random identifier generated at write time.
    pub event_id: String,
    /// Audited operation.
    pub event_type: AuditEventType,
    /// UTC instant the operation completed.
    pub timestamp: DateTime<Utc>,
    /// Owner of the log this event lives in.
    pub principal: String,
    /// Original, human-meaningful filename.
    pub subject_name: String,
    /// Backend name the object is stored under.
    pub storage_key: String,
    /// Object size, recorded for creation events.
    pub size_bytes: Option<u64>,
    /// MIME type, recorded for creation events.
    pub content_type: Option<String>,
    /// Network origin of the actor.
    pub origin_address: Option<String>,
    /// Free-text client identifier such as a user agent.
    pub client_descriptor: Option<String>,
    /// Session correlator.
    pub session_token: Option<String>,
    /// Identity that performed the operation.
    pub actor: String,
}

/// Principal identifier that is safe to use as a log path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalName(String);

impl PrincipalName {
    /// Creates a validated principal name.
    ///
    /// Rejects empty names, `.`/`..`, path separators and control characters.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();

        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "principal must not be empty".to_owned(),
            ));
        }

        if value == "." || value == ".." {
            return Err(AppError::Validation(format!(
                "principal '{value}' is reserved"
            )));
        }

        if value
            .chars()
            .any(|character| character == '/' || character == '\\' || character.is_control())
        {
            return Err(AppError::Validation(format!(
                "principal '{}' contains path separators or control characters",
                value.escape_debug()
            )));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for PrincipalName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for PrincipalName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}
