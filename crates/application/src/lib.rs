//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_log_service;
mod file_intake_service;
mod storage_ports;

#[cfg(test)]
mod test_support;

pub use audit_log_service::{
    AUDIT_LOG_COLUMNS, AuditLogConfig, AuditLogService, AuditSearchCriteria, ClientContext,
    DEFAULT_AUDIT_ROOT, DecodedAuditLog, decode_audit_log, encode_audit_log,
};
pub use file_intake_service::{
    DEFAULT_FILES_ROOT, DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_PAGE_SIZE, DownloadedFile,
    FileIntakeConfig, FileIntakeService, FilePage, UploadFileInput, UploadedFile,
};
pub use storage_ports::{
    ObjectStore, join_object_path, validate_object_path, validate_path_segment,
};
