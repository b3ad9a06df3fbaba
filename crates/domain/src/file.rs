//! File naming and validation rules applied before bytes reach storage.

use chrono::{DateTime, Utc};
use coffer_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::CalendarZone;

/// Replacement used when an upload carries no usable filename.
pub const UNNAMED_FILE: &str = "unnamed_file";

const STORAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";
const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Metadata describing one stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Filename as provided by the uploader.
    pub original_filename: String,
    /// Timestamp-prefixed, sanitized storage name.
    pub storage_name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Declared MIME type.
    pub content_type: String,
}

/// Replaces every character that could escape a storage directory or confuse
/// downstream tooling.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    if filename.trim().is_empty() {
        return UNNAMED_FILE.to_owned();
    }

    let sanitized: String = filename
        .chars()
        .map(|character| match character {
            '.' | '/' | '\\' => '_',
            character if character.is_ascii_alphanumeric() || character == '-' => character,
            _ => '_',
        })
        .collect();

    if sanitized.starts_with('_') {
        format!("file{sanitized}")
    } else {
        sanitized
    }
}

/// Builds the storage name `<YYYY-MM-DDTHH-mm-ss>_<sanitized>` for an upload.
#[must_use]
pub fn storage_filename(original_filename: &str, now: DateTime<Utc>, zone: CalendarZone) -> String {
    format!(
        "{}_{}",
        zone.local_datetime(&now).format(STORAGE_TIMESTAMP_FORMAT),
        sanitize_filename(original_filename)
    )
}

/// Rejects empty uploads and uploads larger than `max_size_bytes`.
pub fn validate_file_size(size_bytes: u64, max_size_bytes: u64) -> AppResult<()> {
    if size_bytes == 0 {
        return Err(AppError::Validation("uploaded file is empty".to_owned()));
    }

    if size_bytes > max_size_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "file exceeds maximum size of {} MB",
            max_size_bytes / BYTES_PER_MEGABYTE
        )));
    }

    Ok(())
}

/// Checks a declared content type against the allow-list.
///
/// An empty allow-list accepts every non-blank content type. Entries match as
/// case-insensitive prefixes, so `image/` admits every image subtype.
pub fn validate_content_type(content_type: Option<&str>, allowed: &[String]) -> AppResult<()> {
    let Some(content_type) = content_type.filter(|value| !value.trim().is_empty()) else {
        return Err(AppError::UnsupportedMediaType(
            "file type could not be determined".to_owned(),
        ));
    };

    if allowed.is_empty() {
        return Ok(());
    }

    let normalized = content_type.trim().to_ascii_lowercase();
    let is_allowed = allowed
        .iter()
        .any(|allowed_type| normalized.starts_with(&allowed_type.trim().to_ascii_lowercase()));

    if !is_allowed {
        return Err(AppError::UnsupportedMediaType(format!(
            "file type '{content_type}' is not allowed, supported types: {}",
            allowed.join(", ")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use coffer_core::AppError;
    use proptest::prelude::*;

    use super::{
        UNNAMED_FILE, sanitize_filename, storage_filename, validate_content_type,
        validate_file_size,
    };
    use crate::CalendarZone;

    #[test]
    fn sanitize_replaces_traversal_characters() {
        assert_eq!(sanitize_filename("../etc/passwd"), "file___etc_passwd");
        assert_eq!(sanitize_filename("report.pdf"), "report_pdf");
        assert_eq!(sanitize_filename("   "), UNNAMED_FILE);
    }

    #[test]
    fn storage_filename_prefixes_timestamp() {
        let now = Utc
            .with_ymd_and_hms(2024, 11, 9, 14, 30, 0)
            .single()
            .unwrap_or_default();

        assert_eq!(
            storage_filename("Q3 report.pdf", now, CalendarZone::utc()),
            "2024-11-09T14-30-00_Q3_report_pdf"
        );
    }

    #[test]
    fn file_size_limits_are_enforced() {
        assert!(validate_file_size(10, 10).is_ok());
        assert!(matches!(
            validate_file_size(11, 10),
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            validate_file_size(0, 10),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn content_type_prefix_matching_is_case_insensitive() {
        let allowed = vec!["application/pdf".to_owned(), "image/".to_owned()];

        assert!(validate_content_type(Some("IMAGE/PNG"), &allowed).is_ok());
        assert!(validate_content_type(Some("application/pdf"), &allowed).is_ok());
        assert!(matches!(
            validate_content_type(Some("text/html"), &allowed),
            Err(AppError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            validate_content_type(None, &allowed),
            Err(AppError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn empty_allow_list_accepts_any_declared_type() {
        assert!(validate_content_type(Some("application/x-anything"), &[]).is_ok());
        assert!(validate_content_type(Some(" "), &[]).is_err());
    }

    proptest! {
        #[test]
        fn sanitized_names_only_contain_safe_characters(name in ".*") {
            let sanitized = sanitize_filename(&name);
            prop_assert!(!sanitized.is_empty());
            prop_assert!(!sanitized.starts_with('_'));
            prop_assert!(sanitized
                .chars()
                .all(|character| character.is_ascii_alphanumeric() || character == '_' || character == '-'));
        }
    }
}
