use std::collections::HashMap;
use std::path::PathBuf;

use coffer_core::AppError;
use coffer_domain::CalendarZone;

use super::{ApiConfig, StorageBackend};

fn base_env() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("DEV_USERNAME", "dev"),
        ("DEV_PASSWORD", "dev-secret"),
        ("ADMIN_USERNAME", "admin"),
        ("ADMIN_PASSWORD", "admin-secret"),
    ])
}

fn load(vars: &HashMap<&'static str, &'static str>) -> Result<ApiConfig, AppError> {
    ApiConfig::load_from(|name| vars.get(name).map(|value| (*value).to_owned()))
}

#[test]
fn defaults_apply_when_only_credentials_are_set() {
    let config = load(&base_env());

    assert!(config.is_ok());
    let config = config.unwrap_or_else(|_| unreachable!());
    assert_eq!(config.api_host, "127.0.0.1");
    assert_eq!(config.api_port, 3001);
    assert_eq!(config.frontend_url, "http://localhost:3000");
    assert_eq!(config.storage_backend, StorageBackend::Local);
    assert_eq!(config.storage_root_dir, PathBuf::from("./data"));
    assert_eq!(config.files_prefix, "files");
    assert_eq!(config.audit_prefix, "audit");
    assert_eq!(config.max_file_size_bytes, 104_857_600);
    assert!(config.allowed_content_types.is_empty());
    assert_eq!(config.calendar, CalendarZone::Local);
    assert_eq!(config.request_body_limit(), 104_857_600 + 1_048_576);
}

#[test]
fn overrides_are_parsed() {
    let mut vars = base_env();
    vars.insert("API_PORT", "8080");
    vars.insert("STORAGE_BACKEND", "Memory");
    vars.insert("FILES_PREFIX", "/uploads/");
    vars.insert("ALLOWED_CONTENT_TYPES", "image/, application/pdf ,,");
    vars.insert("AUDIT_CALENDAR_UTC_OFFSET_MINUTES", "-300");

    let config = load(&vars).unwrap_or_else(|_| unreachable!());

    assert_eq!(config.api_port, 8080);
    assert_eq!(config.storage_backend, StorageBackend::Memory);
    assert_eq!(config.files_prefix, "uploads");
    assert_eq!(
        config.allowed_content_types,
        vec!["image/".to_owned(), "application/pdf".to_owned()]
    );
    assert_eq!(config.calendar, CalendarZone::from_offset_minutes(-300).unwrap_or_default());
}

#[test]
fn missing_credentials_are_rejected() {
    let mut vars = base_env();
    vars.remove("ADMIN_PASSWORD");

    assert!(matches!(load(&vars), Err(AppError::Validation(message)) if message.contains("ADMIN_PASSWORD")));
}

#[test]
fn invalid_values_are_rejected() {
    for (name, value) in [
        ("API_PORT", "not-a-port"),
        ("STORAGE_BACKEND", "s3"),
        ("MAX_FILE_SIZE_BYTES", "0"),
        ("MAX_FILE_SIZE_BYTES", "-1"),
        ("AUDIT_CALENDAR_UTC_OFFSET_MINUTES", "100000"),
        ("AUDIT_PREFIX", "files"),
        ("ADMIN_USERNAME", "dev"),
    ] {
        let mut vars = base_env();
        vars.insert(name, value);

        assert!(
            matches!(load(&vars), Err(AppError::Validation(_))),
            "{name}={value} should be rejected"
        );
    }
}

#[test]
fn socket_address_requires_an_ip_host() {
    let mut vars = base_env();
    vars.insert("API_HOST", "localhost");
    let config = load(&vars).unwrap_or_else(|_| unreachable!());

    assert!(matches!(config.socket_address(), Err(AppError::Internal(_))));
}

#[test]
fn debug_output_hides_passwords() {
    let config = load(&base_env()).unwrap_or_else(|_| unreachable!());

    let rendered = format!("{config:?}");

    assert!(!rendered.contains("admin-secret"));
    assert!(rendered.contains("<redacted>"));
}
