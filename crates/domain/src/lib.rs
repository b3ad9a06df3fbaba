//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod calendar;
mod file;

pub use audit::{AuditEvent, AuditEventType, PrincipalName};
pub use calendar::CalendarZone;
pub use file::{
    FileMetadata, UNNAMED_FILE, sanitize_filename, storage_filename, validate_content_type,
    validate_file_size,
};
