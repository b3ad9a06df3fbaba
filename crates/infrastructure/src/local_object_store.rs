use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use coffer_application::{ObjectStore, validate_object_path};
use coffer_core::{AppError, AppResult};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};


/// Object store backed by a directory on the local filesystem.
///
/// Object keys map onto relative paths below the root directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Opens a store rooted at `root`, creating the directory when missing.
    pub async fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|error| {
            AppError::Storage(format!(
                "failed to create storage root '{}': {error}",
                root.display()
            ))
        })?;

        debug!(root = %root.display(), "opened local object store");
        Ok(Self { root })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        validate_object_path(path)?;
        Ok(path
            .split('/')
            .fold(self.root.clone(), |resolved, segment| resolved.join(segment)))
    }

    async fn ensure_parent(&self, path: &str, resolved: &Path) -> AppResult<()> {
        let Some(parent) = resolved.parent() else {
            return Ok(());
        };

        fs::create_dir_all(parent).await.map_err(|error| {
            AppError::Storage(format!(
                "failed to create parent directories for '{path}': {error}"
            ))
        })
    }

    fn object_key(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect();
        segments.map(|segments| segments.join("/"))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, path: &str) -> AppResult<bool> {
        let resolved = self.resolve(path)?;
        match fs::metadata(&resolved).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(AppError::Storage(format!(
                "failed to inspect object '{path}': {error}"
            ))),
        }
    }

    async fn read_bytes(&self, path: &str) -> AppResult<Vec<u8>> {
        let resolved = self.resolve(path)?;
        fs::read(&resolved).await.map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                AppError::NotFound(format!("object '{path}' does not exist"))
            } else {
                AppError::Storage(format!("failed to read object '{path}': {error}"))
            }
        })
    }

    async fn write_bytes(&self, path: &str, content: &[u8]) -> AppResult<()> {
        let resolved = self.resolve(path)?;
        self.ensure_parent(path, &resolved).await?;
        fs::write(&resolved, content)
            .await
            .map_err(|error| AppError::Storage(format!("failed to write object '{path}': {error}")))
    }

    async fn append_string(&self, path: &str, content: &str) -> AppResult<()> {
        let resolved = self.resolve(path)?;
        self.ensure_parent(path, &resolved).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&resolved)
            .await
            .map_err(|error| {
                AppError::Storage(format!("failed to open object '{path}' for append: {error}"))
            })?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|error| AppError::Storage(format!("failed to append to '{path}': {error}")))?;
        file.flush()
            .await
            .map_err(|error| AppError::Storage(format!("failed to flush '{path}': {error}")))
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let prefix = prefix.trim_matches('/');
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix)?
        };

        match fs::metadata(&start).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(AppError::Storage(format!(
                    "failed to inspect prefix '{prefix}': {error}"
                )));
            }
        }

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(directory) = pending.pop() {
            let mut entries = fs::read_dir(&directory).await.map_err(|error| {
                AppError::Storage(format!(
                    "failed to list '{}': {error}",
                    directory.display()
                ))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|error| {
                AppError::Storage(format!(
                    "failed to read entry in '{}': {error}",
                    directory.display()
                ))
            })? {
                let file_type = entry.file_type().await.map_err(|error| {
                    AppError::Storage(format!(
                        "failed to inspect '{}': {error}",
                        entry.path().display()
                    ))
                })?;

                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    match self.object_key(&entry.path()) {
                        Some(key) => keys.push(key),
                        None => warn!(
                            path = %entry.path().display(),
                            "skipping file with a non UTF-8 name"
                        ),
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
