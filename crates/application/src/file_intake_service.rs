use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use coffer_core::{AppError, AppResult, UserIdentity};
use coffer_domain::{
    AuditEvent, AuditEventType, CalendarZone, FileMetadata, PrincipalName, UNNAMED_FILE,
    storage_filename, validate_content_type, validate_file_size,
};

use crate::audit_log_service::{AuditLogService, AuditSearchCriteria, ClientContext};
use crate::storage_ports::{ObjectStore, join_object_path, validate_path_segment};


/// Default object prefix holding `<owner>/<storage-name>` uploads.
pub const DEFAULT_FILES_ROOT: &str = "files";
/// Default upload limit of 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;
/// Default number of uploads per admin listing page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

const MAX_STORAGE_NAME_ATTEMPTS: usize = 100;

/// Configuration for upload validation, placement and listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIntakeConfig {
    /// Object prefix holding uploads.
    pub files_root: String,
    /// Largest accepted upload.
    pub max_file_size_bytes: u64,
    /// Accepted content type prefixes; empty accepts every type.
    pub allowed_content_types: Vec<String>,
    /// Zone used for the timestamp prefix of storage names.
    pub calendar: CalendarZone,
    /// Uploads per listing page.
    pub page_size: usize,
}

impl Default for FileIntakeConfig {
    fn default() -> Self {
        Self {
            files_root: DEFAULT_FILES_ROOT.to_owned(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            allowed_content_types: Vec::new(),
            calendar: CalendarZone::Local,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Upload payload as received from the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFileInput {
    /// Client-supplied filename.
    pub original_filename: Option<String>,
    /// Declared MIME type.
    pub content_type: Option<String>,
    /// File bytes.
    pub content: Vec<u8>,
}

/// Result of a stored and audited upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Stored file metadata.
    pub metadata: FileMetadata,
    /// Audit event recorded for the upload.
    pub event: AuditEvent,
}

/// File bytes returned to an admin download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Filename the owner uploaded the object under.
    pub original_filename: String,
    /// Backend storage name.
    pub storage_name: String,
    /// File bytes.
    pub content: Vec<u8>,
}

/// One page of upload events, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePage {
    /// Upload events on this page.
    pub items: Vec<AuditEvent>,
    /// Zero-based page index.
    pub page: usize,
    /// Maximum number of items per page.
    pub page_size: usize,
    /// Number of uploads matching the criteria.
    pub total_results: usize,
    /// Number of pages needed for every matching upload.
    pub total_pages: usize,
}

/// Application service for storing, downloading and listing uploads.
#[derive(Clone)]
pub struct FileIntakeService {
    store: Arc<dyn ObjectStore>,
    audit_log_service: AuditLogService,
    config: FileIntakeConfig,
}

impl FileIntakeService {
    /// Creates a service writing uploads to `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        audit_log_service: AuditLogService,
        config: FileIntakeConfig,
    ) -> Self {
        Self {
            store,
            audit_log_service,
            config,
        }
    }

    /// Validates and stores an upload, then records it in the uploader's log.
    pub async fn upload(
        &self,
        actor: &UserIdentity,
        input: UploadFileInput,
        client: &ClientContext,
    ) -> AppResult<UploadedFile> {
        let owner = PrincipalName::new(actor.subject())?;
        let size_bytes = u64::try_from(input.content.len())
            .map_err(|error| AppError::Internal(format!("upload size overflow: {error}")))?;
        validate_file_size(size_bytes, self.config.max_file_size_bytes)?;
        validate_content_type(
            input.content_type.as_deref(),
            &self.config.allowed_content_types,
        )?;

        let original_filename = input
            .original_filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNNAMED_FILE)
            .to_owned();
        let content_type = input
            .content_type
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_owned();

        let storage_name = self.unused_storage_name(&owner, &original_filename).await?;
        let path = self.file_path(owner.as_str(), &storage_name);
        if let Err(write_error) = self.store.write_bytes(&path, &input.content).await {
            error!(
                principal = %owner,
                storage_key = %storage_name,
                error = %write_error,
                "failed to store upload"
            );
            return Err(write_error);
        }

        let metadata = FileMetadata {
            original_filename,
            storage_name,
            size_bytes,
            content_type,
        };

        let event = self
            .audit_log_service
            .record_upload(owner.as_str(), &metadata, client)
            .await
            .inspect_err(|audit_error| {
                error!(
                    principal = %owner,
                    actor = %actor.subject(),
                    storage_key = %metadata.storage_name,
                    operation = "upload",
                    error = %audit_error,
                    "upload stored but audit recording failed"
                );
            })?;

        info!(
            principal = %owner,
            storage_key = %metadata.storage_name,
            size_bytes = metadata.size_bytes,
            "file uploaded"
        );

        Ok(UploadedFile { metadata, event })
    }

    /// Returns a stored file to an admin and records the download in the
    /// owner's log.
    pub async fn download(
        &self,
        actor: &UserIdentity,
        owner: &str,
        storage_name: &str,
        client: &ClientContext,
    ) -> AppResult<DownloadedFile> {
        actor.require_admin()?;
        let owner = PrincipalName::new(owner)?;
        validate_path_segment(storage_name)?;

        let path = self.file_path(owner.as_str(), storage_name);
        if !self.store.exists(&path).await? {
            return Err(AppError::NotFound(format!(
                "file '{storage_name}' of '{owner}' does not exist"
            )));
        }

        let content = self.store.read_bytes(&path).await?;
        let original_filename = self
            .audit_log_service
            .original_subject_name(owner.as_str(), storage_name)
            .await?;

        self.audit_log_service
            .record_download(
                owner.as_str(),
                &original_filename,
                storage_name,
                actor.subject(),
                client,
            )
            .await
            .inspect_err(|audit_error| {
                error!(
                    principal = %owner,
                    actor = %actor.subject(),
                    storage_key = %storage_name,
                    operation = "download",
                    error = %audit_error,
                    "download withheld because audit recording failed"
                );
            })?;

        info!(
            principal = %owner,
            actor = %actor.subject(),
            storage_key = %storage_name,
            "file downloaded"
        );

        Ok(DownloadedFile {
            original_filename,
            storage_name: storage_name.to_owned(),
            content,
        })
    }

    /// Lists upload events matching `criteria`, one page at a time.
    pub async fn list_uploaded_files(
        &self,
        actor: &UserIdentity,
        criteria: &AuditSearchCriteria,
        page: usize,
    ) -> AppResult<FilePage> {
        actor.require_admin()?;

        let uploads_only = AuditSearchCriteria {
            event_type_equals: Some(AuditEventType::Upload),
            ..criteria.clone()
        };
        let uploads = self.audit_log_service.search(&uploads_only).await?;

        let page_size = self.config.page_size.max(1);
        let total_results = uploads.len();
        let total_pages = total_results.div_ceil(page_size);
        let items = uploads
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(FilePage {
            items,
            page,
            page_size,
            total_results,
            total_pages,
        })
    }

    /// Searches every audit event, uploads and downloads alike.
    pub async fn search_audit(
        &self,
        actor: &UserIdentity,
        criteria: &AuditSearchCriteria,
    ) -> AppResult<Vec<AuditEvent>> {
        actor.require_admin()?;
        self.audit_log_service.search(criteria).await
    }

    fn file_path(&self, owner: &str, storage_name: &str) -> String {
        join_object_path(&[self.config.files_root.as_str(), owner, storage_name])
    }

    async fn unused_storage_name(
        &self,
        owner: &PrincipalName,
        original_filename: &str,
    ) -> AppResult<String> {
        let base = storage_filename(original_filename, Utc::now(), self.config.calendar);
        if !self.store.exists(&self.file_path(owner.as_str(), &base)).await? {
            return Ok(base);
        }

        for attempt in 1..MAX_STORAGE_NAME_ATTEMPTS {
            let candidate = format!("{base}_{attempt}");
            if !self
                .store
                .exists(&self.file_path(owner.as_str(), &candidate))
                .await?
            {
                warn!(
                    principal = %owner,
                    storage_key = %candidate,
                    "storage name collision resolved with suffix"
                );
                return Ok(candidate);
            }
        }

        Err(AppError::Internal(format!(
            "could not find a free storage name for '{base}'"
        )))
    }
}
