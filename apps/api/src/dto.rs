use chrono::{NaiveDate, SecondsFormat};
use coffer_application::{AuditSearchCriteria, FilePage, UploadedFile};
use coffer_core::{AppError, AppResult, UserIdentity};
use coffer_domain::{AuditEvent, AuditEventType};
use serde::{Deserialize, Serialize};


const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// API representation of the authenticated user.
#[derive(Debug, Serialize)]
pub struct UserIdentityResponse {
    pub subject: String,
    pub role: &'static str,
    pub is_admin: bool,
}

impl From<UserIdentity> for UserIdentityResponse {
    fn from(value: UserIdentity) -> Self {
        Self {
            subject: value.subject().to_owned(),
            role: value.role().as_str(),
            is_admin: value.is_admin(),
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    pub storage_name: String,
}

impl From<UploadedFile> for UploadResponse {
    fn from(value: UploadedFile) -> Self {
        Self {
            status: "success",
            message: format!(
                "file '{}' uploaded successfully",
                value.metadata.original_filename
            ),
            storage_name: value.metadata.storage_name,
        }
    }
}

/// Query string accepted by the upload listing.
#[derive(Debug, Default, Deserialize)]
pub struct FileListQuery {
    pub filename: Option<String>,
    pub username: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<usize>,
}

impl FileListQuery {
    pub fn criteria(&self) -> AppResult<AuditSearchCriteria> {
        Ok(AuditSearchCriteria {
            subject_name_contains: self.filename.clone(),
            principal_equals: self.username.clone(),
            event_type_equals: None,
            date_on_or_after: parse_query_date("start_date", self.start_date.as_deref())?,
            date_on_or_before: parse_query_date("end_date", self.end_date.as_deref())?,
        })
    }
}

/// Query string accepted by the audit search.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub filename: Option<String>,
    pub username: Option<String>,
    pub event_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl AuditQuery {
    pub fn criteria(&self) -> AppResult<AuditSearchCriteria> {
        Ok(AuditSearchCriteria {
            subject_name_contains: self.filename.clone(),
            principal_equals: self.username.clone(),
            event_type_equals: self
                .event_type
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| AuditEventType::from(value.to_ascii_uppercase())),
            date_on_or_after: parse_query_date("start_date", self.start_date.as_deref())?,
            date_on_or_before: parse_query_date("end_date", self.end_date.as_deref())?,
        })
    }
}

/// API representation of one audit event.
#[derive(Debug, Serialize)]
pub struct AuditEventResponse {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: String,
    pub principal: String,
    pub subject_name: String,
    pub storage_key: String,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub origin_address: Option<String>,
    pub client_descriptor: Option<String>,
    pub session_token: Option<String>,
    pub actor: String,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(value: AuditEvent) -> Self {
        Self {
            event_id: value.event_id,
            event_type: value.event_type.as_str().to_owned(),
            timestamp: value.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            principal: value.principal,
            subject_name: value.subject_name,
            storage_key: value.storage_key,
            size_bytes: value.size_bytes,
            content_type: value.content_type,
            origin_address: value.origin_address,
            client_descriptor: value.client_descriptor,
            session_token: value.session_token,
            actor: value.actor,
        }
    }
}

/// API representation of one stored upload.
#[derive(Debug, Serialize)]
pub struct UploadedFileResponse {
    pub owner: String,
    pub original_filename: String,
    pub storage_name: String,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub uploaded_at: String,
    pub download_path: String,
}

impl From<AuditEvent> for UploadedFileResponse {
    fn from(value: AuditEvent) -> Self {
        let download_path = format!("/api/files/{}/{}", value.principal, value.storage_key);
        Self {
            owner: value.principal,
            original_filename: value.subject_name,
            storage_name: value.storage_key,
            size_bytes: value.size_bytes,
            content_type: value.content_type,
            uploaded_at: value.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            download_path,
        }
    }
}

/// One page of the upload listing.
#[derive(Debug, Serialize)]
pub struct FilePageResponse {
    pub items: Vec<UploadedFileResponse>,
    pub page: usize,
    pub page_size: usize,
    pub total_results: usize,
    pub total_pages: usize,
}

impl From<FilePage> for FilePageResponse {
    fn from(value: FilePage) -> Self {
        Self {
            items: value
                .items
                .into_iter()
                .map(UploadedFileResponse::from)
                .collect(),
            page: value.page,
            page_size: value.page_size,
            total_results: value.total_results,
            total_pages: value.total_pages,
        }
    }
}

fn parse_query_date(name: &str, value: Option<&str>) -> AppResult<Option<NaiveDate>> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            NaiveDate::parse_from_str(value, QUERY_DATE_FORMAT).map_err(|error| {
                AppError::Validation(format!(
                    "{name} must be formatted as YYYY-MM-DD, got '{value}': {error}"
                ))
            })
        })
        .transpose()
}
