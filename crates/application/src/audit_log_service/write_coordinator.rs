use std::slice;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use coffer_core::AppResult;
use coffer_domain::{AuditEvent, PrincipalName};

use super::codec::{audit_log_header, encode_audit_log, has_audit_header};
use super::directory::PrincipalDirectory;
use super::read_cache::AuditReadCache;
use crate::storage_ports::ObjectStore;

/// Serializes appends per principal; different principals proceed in parallel.
pub(crate) struct WriteCoordinator {
    store: Arc<dyn ObjectStore>,
    directory: PrincipalDirectory,
    cache: Arc<AuditReadCache>,
    locks: DashMap<String, Arc<Mutex<LogState>>>,
}

/// What the lock holder knows about a principal's log object.
#[derive(Debug, Default)]
struct LogState {
    /// Set after this process wrote the log: it has a header and ends with a
    /// newline, so the next event is a pure append.
    appendable: bool,
}

/// Shape of an existing log object before an append.
enum LogShape {
    Blank,
    Headerless,
    Intact { ends_with_newline: bool },
}

impl LogShape {
    fn of(text: &str) -> Self {
        if text.trim().is_empty() {
            Self::Blank
        } else if has_audit_header(text) {
            Self::Intact {
                ends_with_newline: text.ends_with('\n'),
            }
        } else {
            Self::Headerless
        }
    }
}

impl WriteCoordinator {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        directory: PrincipalDirectory,
        cache: Arc<AuditReadCache>,
    ) -> Self {
        Self {
            store,
            directory,
            cache,
            locks: DashMap::new(),
        }
    }

    /// Appends one event to its principal's log.
    ///
    /// A new log is created with the header and the event in one write. A log
    /// this coordinator already wrote only receives the encoded event line.
    /// Any other existing log is inspected once under the lock: a blank or
    /// header-less object gets the header written first, and a missing final
    /// newline is restored before the event line.
    pub(crate) async fn append(&self, event: &AuditEvent) -> AppResult<()> {
        let principal = PrincipalName::new(event.principal.as_str())?;
        let path = self.directory.log_path(&principal);
        let lock = self.lock_for(&principal);
        let mut state = lock.lock().await;

        let written = self
            .write_event(&principal, path.as_str(), event, state.appendable)
            .await;
        state.appendable = written.is_ok();
        written?;

        self.cache.invalidate(&principal);
        Ok(())
    }

    async fn write_event(
        &self,
        principal: &PrincipalName,
        path: &str,
        event: &AuditEvent,
        appendable: bool,
    ) -> AppResult<()> {
        let line = encode_audit_log(slice::from_ref(event), false)?;
        if appendable {
            return self.store.append_string(path, line.as_str()).await;
        }

        if !self.store.exists(path).await? {
            let document = format!("{}{line}", audit_log_header()?);
            self.store.write_string(path, document.as_str()).await?;
            debug!(principal = %principal, path = %path, "created audit log");
            return Ok(());
        }

        let existing = self.store.read_string(path).await?;
        match LogShape::of(existing.as_str()) {
            LogShape::Intact {
                ends_with_newline: true,
            } => self.store.append_string(path, line.as_str()).await,
            LogShape::Intact {
                ends_with_newline: false,
            } => {
                warn!(
                    principal = %principal,
                    path = %path,
                    "audit log lacks a final newline, terminating last row"
                );
                self.store
                    .append_string(path, format!("\n{line}").as_str())
                    .await
            }
            LogShape::Blank => {
                warn!(
                    principal = %principal,
                    path = %path,
                    "audit log is blank, writing header"
                );
                let document = format!("{}{line}", audit_log_header()?);
                self.store.write_string(path, document.as_str()).await
            }
            LogShape::Headerless => {
                warn!(
                    principal = %principal,
                    path = %path,
                    "audit log has no header, restoring it above existing rows"
                );
                let separator = if existing.ends_with('\n') { "" } else { "\n" };
                let document = format!("{}{existing}{separator}{line}", audit_log_header()?);
                self.store.write_string(path, document.as_str()).await
            }
        }
    }

    fn lock_for(&self, principal: &PrincipalName) -> Arc<Mutex<LogState>> {
        Arc::clone(
            self.locks
                .entry(principal.as_str().to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(LogState::default())))
                .value(),
        )
    }
}
