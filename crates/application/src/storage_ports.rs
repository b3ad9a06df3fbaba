use async_trait::async_trait;

use coffer_core::{AppError, AppResult};

/// Port for the byte storage backend holding uploads and audit logs.
///
/// Paths are `/`-separated keys relative to the backend root. Backends that
/// cannot append natively must emulate [`ObjectStore::append_string`] with a
/// read-modify-write so callers see the same contract.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns whether an object exists at `path`.
    async fn exists(&self, path: &str) -> AppResult<bool>;

    /// Reads the whole object at `path`.
    ///
    /// Fails with [`AppError::NotFound`] when the object does not exist.
    async fn read_bytes(&self, path: &str) -> AppResult<Vec<u8>>;

    /// Creates or overwrites the object at `path`.
    async fn write_bytes(&self, path: &str, content: &[u8]) -> AppResult<()>;

    /// Appends text to the object at `path`, creating it when missing.
    async fn append_string(&self, path: &str, content: &str) -> AppResult<()>;

    /// Lists every object path below `prefix`, recursively and sorted.
    async fn list(&self, prefix: &str) -> AppResult<Vec<String>>;

    /// Reads the whole object at `path` as UTF-8 text.
    async fn read_string(&self, path: &str) -> AppResult<String> {
        let bytes = self.read_bytes(path).await?;
        String::from_utf8(bytes).map_err(|error| {
            AppError::Storage(format!("object '{path}' is not valid UTF-8: {error}"))
        })
    }

    /// Creates or overwrites the object at `path` with text.
    async fn write_string(&self, path: &str, content: &str) -> AppResult<()> {
        self.write_bytes(path, content.as_bytes()).await
    }
}

/// Validates one path segment such as a username or storage name.
pub fn validate_path_segment(segment: &str) -> AppResult<()> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(AppError::Validation(format!(
            "invalid object path segment '{segment}'"
        )));
    }

    if segment
        .chars()
        .any(|character| character == '/' || character == '\\' || character.is_control())
    {
        return Err(AppError::Validation(format!(
            "object path segment '{}' contains separators or control characters",
            segment.escape_debug()
        )));
    }

    Ok(())
}

/// Validates a full object key: relative, with no empty, `.` or `..` segments.
pub fn validate_object_path(path: &str) -> AppResult<()> {
    if path.starts_with('/') {
        return Err(AppError::Validation(format!(
            "object path '{path}' must be relative"
        )));
    }

    path.split('/').try_for_each(validate_path_segment)
}

/// Joins path segments with `/`, skipping empty prefixes.
#[must_use]
pub fn join_object_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| segment.trim_matches('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
