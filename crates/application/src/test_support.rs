use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};

use coffer_core::{AppError, AppResult};

use crate::storage_ports::ObjectStore;

/// In-memory store whose append is a non-atomic read, yield, write sequence,
/// so unsynchronized writers to one path lose updates.
#[derive(Default)]
pub(crate) struct FakeObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    failing_reads: RwLock<BTreeSet<String>>,
    failing_writes: RwLock<BTreeSet<String>>,
    reads: AtomicUsize,
}

impl FakeObjectStore {
    pub(crate) async fn insert_text(&self, path: &str, text: &str) {
        self.objects
            .write()
            .await
            .insert(path.to_owned(), text.as_bytes().to_vec());
    }

    pub(crate) async fn text(&self, path: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub(crate) async fn fail_reads_for(&self, path: &str) {
        self.failing_reads.write().await.insert(path.to_owned());
    }

    /// Fails every write to a path starting with `prefix`.
    pub(crate) async fn fail_writes_for(&self, prefix: &str) {
        self.failing_writes.write().await.insert(prefix.to_owned());
    }

    pub(crate) fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn check_writable(&self, path: &str) -> AppResult<()> {
        let failing = self.failing_writes.read().await;
        if failing.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return Err(AppError::Storage(format!("simulated write failure for '{path}'")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn exists(&self, path: &str) -> AppResult<bool> {
        Ok(self.objects.read().await.contains_key(path))
    }

    async fn read_bytes(&self, path: &str) -> AppResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.read().await.contains(path) {
            return Err(AppError::Storage(format!("simulated read failure for '{path}'")));
        }

        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("object '{path}' does not exist")))
    }

    async fn write_bytes(&self, path: &str, content: &[u8]) -> AppResult<()> {
        self.check_writable(path).await?;
        self.objects
            .write()
            .await
            .insert(path.to_owned(), content.to_vec());
        Ok(())
    }

    async fn append_string(&self, path: &str, content: &str) -> AppResult<()> {
        self.check_writable(path).await?;
        let mut current = self
            .objects
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or_default();
        tokio::task::yield_now().await;
        current.extend_from_slice(content.as_bytes());
        self.objects.write().await.insert(path.to_owned(), current);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let prefix = prefix.trim_matches('/');
        Ok(self
            .objects
            .read()
            .await
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

/// Store that parks every write to one path until the test releases it.
pub(crate) struct GatedObjectStore {
    inner: Arc<FakeObjectStore>,
    gated_path: String,
    entered: Notify,
    release: Notify,
}

impl GatedObjectStore {
    pub(crate) fn new(inner: Arc<FakeObjectStore>, gated_path: &str) -> Self {
        Self {
            inner,
            gated_path: gated_path.to_owned(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Resolves once a write to the gated path is parked.
    pub(crate) async fn wait_until_parked(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self) {
        self.release.notify_one();
    }

    async fn park_if_gated(&self, path: &str) {
        if path == self.gated_path {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl ObjectStore for GatedObjectStore {
    async fn exists(&self, path: &str) -> AppResult<bool> {
        self.inner.exists(path).await
    }

    async fn read_bytes(&self, path: &str) -> AppResult<Vec<u8>> {
        self.inner.read_bytes(path).await
    }

    async fn write_bytes(&self, path: &str, content: &[u8]) -> AppResult<()> {
        self.park_if_gated(path).await;
        self.inner.write_bytes(path, content).await
    }

    async fn append_string(&self, path: &str, content: &str) -> AppResult<()> {
        self.park_if_gated(path).await;
        self.inner.append_string(path, content).await
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}
