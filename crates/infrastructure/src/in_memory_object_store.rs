use std::collections::BTreeMap;

use async_trait::async_trait;
use coffer_application::{ObjectStore, validate_object_path};
use coffer_core::{AppError, AppResult};
use tokio::sync::RwLock;

#[cfg(test)]
mod tests;

/// In-memory object store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn exists(&self, path: &str) -> AppResult<bool> {
        validate_object_path(path)?;
        Ok(self.objects.read().await.contains_key(path))
    }

    async fn read_bytes(&self, path: &str) -> AppResult<Vec<u8>> {
        validate_object_path(path)?;
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("object '{path}' does not exist")))
    }

    async fn write_bytes(&self, path: &str, content: &[u8]) -> AppResult<()> {
        validate_object_path(path)?;
        self.objects
            .write()
            .await
            .insert(path.to_owned(), content.to_vec());
        Ok(())
    }

    async fn append_string(&self, path: &str, content: &str) -> AppResult<()> {
        validate_object_path(path)?;
        self.objects
            .write()
            .await
            .entry(path.to_owned())
            .or_default()
            .extend_from_slice(content.as_bytes());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let prefix = prefix.trim_matches('/');
        if !prefix.is_empty() {
            validate_object_path(prefix)?;
        }

        let objects = self.objects.read().await;
        Ok(objects
            .keys()
            .filter(|path| {
                prefix.is_empty()
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .cloned()
            .collect())
    }
}
