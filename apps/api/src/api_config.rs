use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use coffer_application::{DEFAULT_AUDIT_ROOT, DEFAULT_FILES_ROOT, DEFAULT_MAX_FILE_SIZE_BYTES};
use coffer_core::AppError;
use coffer_domain::CalendarZone;
use tracing_subscriber::EnvFilter;

#[cfg(test)]
mod tests;

/// Extra room for multipart boundaries and part headers on top of the file.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::Validation(format!(
                "STORAGE_BACKEND must be either 'local' or 'memory', got '{other}'"
            ))),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AccountCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub storage_backend: StorageBackend,
    pub storage_root_dir: PathBuf,
    pub files_prefix: String,
    pub audit_prefix: String,
    pub max_file_size_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub calendar: CalendarZone,
    pub user_account: AccountCredentials,
    pub admin_account: AccountCredentials,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let frontend_url =
            optional("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_owned());
        let api_host = optional("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = optional("API_PORT")
            .map(|value| {
                value
                    .trim()
                    .parse::<u16>()
                    .map_err(|error| AppError::Validation(format!("invalid API_PORT: {error}")))
            })
            .transpose()?
            .unwrap_or(3001);

        let storage_backend = optional("STORAGE_BACKEND")
            .map(|value| value.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::Local);
        let storage_root_dir =
            PathBuf::from(optional("STORAGE_ROOT_DIR").unwrap_or_else(|| "./data".to_owned()));
        let files_prefix = optional("FILES_PREFIX")
            .map(|value| value.trim().trim_matches('/').to_owned())
            .unwrap_or_else(|| DEFAULT_FILES_ROOT.to_owned());
        let audit_prefix = optional("AUDIT_PREFIX")
            .map(|value| value.trim().trim_matches('/').to_owned())
            .unwrap_or_else(|| DEFAULT_AUDIT_ROOT.to_owned());
        if files_prefix == audit_prefix {
            return Err(AppError::Validation(
                "FILES_PREFIX and AUDIT_PREFIX must differ".to_owned(),
            ));
        }

        let max_file_size_bytes = optional("MAX_FILE_SIZE_BYTES")
            .map(|value| {
                value.trim().parse::<u64>().map_err(|error| {
                    AppError::Validation(format!("invalid MAX_FILE_SIZE_BYTES: {error}"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES);
        if max_file_size_bytes == 0 {
            return Err(AppError::Validation(
                "MAX_FILE_SIZE_BYTES must be greater than zero".to_owned(),
            ));
        }

        let allowed_content_types = optional("ALLOWED_CONTENT_TYPES")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let calendar = match optional("AUDIT_CALENDAR_UTC_OFFSET_MINUTES") {
            Some(value) => {
                let minutes = value.trim().parse::<i32>().map_err(|error| {
                    AppError::Validation(format!(
                        "invalid AUDIT_CALENDAR_UTC_OFFSET_MINUTES: {error}"
                    ))
                })?;
                CalendarZone::from_offset_minutes(minutes).ok_or_else(|| {
                    AppError::Validation(format!(
                        "AUDIT_CALENDAR_UTC_OFFSET_MINUTES out of range: {minutes}"
                    ))
                })?
            }
            None => CalendarZone::Local,
        };

        let user_account = AccountCredentials {
            username: required_non_empty(&lookup, "DEV_USERNAME")?,
            password: required_non_empty(&lookup, "DEV_PASSWORD")?,
        };
        let admin_account = AccountCredentials {
            username: required_non_empty(&lookup, "ADMIN_USERNAME")?,
            password: required_non_empty(&lookup, "ADMIN_PASSWORD")?,
        };
        if user_account.username == admin_account.username {
            return Err(AppError::Validation(
                "DEV_USERNAME and ADMIN_USERNAME must differ".to_owned(),
            ));
        }

        Ok(Self {
            frontend_url,
            api_host,
            api_port,
            storage_backend,
            storage_root_dir,
            files_prefix,
            audit_prefix,
            max_file_size_bytes,
            allowed_content_types,
            calendar,
            user_account,
            admin_account,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }

    /// Largest accepted request body.
    pub fn request_body_limit(&self) -> usize {
        usize::try_from(
            self.max_file_size_bytes
                .saturating_add(MULTIPART_OVERHEAD_BYTES),
        )
        .unwrap_or(usize::MAX)
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String, AppError> {
    let value =
        lookup(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
