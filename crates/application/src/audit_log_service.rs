use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use coffer_core::AppResult;
use coffer_domain::{AuditEvent, AuditEventType, CalendarZone, FileMetadata, PrincipalName};

use crate::storage_ports::ObjectStore;

mod codec;
mod config;
mod directory;
mod read_cache;
mod search;
mod write_coordinator;

pub use codec::{AUDIT_LOG_COLUMNS, DecodedAuditLog, decode_audit_log, encode_audit_log};
pub use config::{AuditLogConfig, DEFAULT_AUDIT_ROOT};
pub use search::AuditSearchCriteria;

use directory::PrincipalDirectory;
use read_cache::AuditReadCache;
use search::sort_newest_first;
use write_coordinator::WriteCoordinator;


/// Request-scoped details recorded alongside every audit event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    /// Network origin of the caller.
    pub origin_address: Option<String>,
    /// Caller user-agent if available.
    pub client_descriptor: Option<String>,
    /// Session correlator if the caller supplied one.
    pub session_token: Option<String>,
}

/// Application service for the per-principal audit log.
#[derive(Clone)]
pub struct AuditLogService {
    directory: PrincipalDirectory,
    cache: Arc<AuditReadCache>,
    writer: Arc<WriteCoordinator>,
    calendar: CalendarZone,
}

impl AuditLogService {
    /// Creates a service storing logs in `store` under the configured root.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, config: AuditLogConfig) -> Self {
        let directory = PrincipalDirectory::new(store.clone(), config.root.as_str());
        let cache = Arc::new(AuditReadCache::new(store.clone(), directory.clone()));
        let writer = Arc::new(WriteCoordinator::new(
            store,
            directory.clone(),
            cache.clone(),
        ));

        Self {
            directory,
            cache,
            writer,
            calendar: config.calendar,
        }
    }

    /// Appends a fully formed event to its principal's log.
    pub async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if let Err(append_error) = self.writer.append(&event).await {
            error!(
                principal = %event.principal,
                event_id = %event.event_id,
                event_type = %event.event_type,
                timestamp = %event.timestamp,
                error = %append_error,
                "failed to append audit event"
            );
            return Err(append_error);
        }

        info!(
            principal = %event.principal,
            event_id = %event.event_id,
            event_type = %event.event_type,
            "audit event recorded"
        );
        Ok(())
    }

    /// Records the upload of `metadata` by `principal`.
    pub async fn record_upload(
        &self,
        principal: &str,
        metadata: &FileMetadata,
        client: &ClientContext,
    ) -> AppResult<AuditEvent> {
        let event = AuditEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type: AuditEventType::Upload,
            timestamp: Utc::now(),
            principal: principal.to_owned(),
            subject_name: metadata.original_filename.clone(),
            storage_key: metadata.storage_name.clone(),
            size_bytes: Some(metadata.size_bytes),
            content_type: Some(metadata.content_type.clone()),
            origin_address: client.origin_address.clone(),
            client_descriptor: client.client_descriptor.clone(),
            session_token: client.session_token.clone(),
            actor: principal.to_owned(),
        };

        self.append_event(event.clone()).await?;
        Ok(event)
    }

    /// Records that `actor` downloaded an object owned by `owner`.
    ///
    /// The event lands in the owner's log.
    pub async fn record_download(
        &self,
        owner: &str,
        subject_name: &str,
        storage_key: &str,
        actor: &str,
        client: &ClientContext,
    ) -> AppResult<AuditEvent> {
        let event = AuditEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type: AuditEventType::Download,
            timestamp: Utc::now(),
            principal: owner.to_owned(),
            subject_name: subject_name.to_owned(),
            storage_key: storage_key.to_owned(),
            size_bytes: None,
            content_type: None,
            origin_address: client.origin_address.clone(),
            client_descriptor: client.client_descriptor.clone(),
            session_token: client.session_token.clone(),
            actor: actor.to_owned(),
        };

        self.append_event(event.clone()).await?;
        Ok(event)
    }

    /// Searches every principal's log, newest first.
    pub async fn search(&self, criteria: &AuditSearchCriteria) -> AppResult<Vec<AuditEvent>> {
        let criteria = criteria.normalized();
        if criteria.has_empty_date_range() {
            debug!("audit search date range is empty");
            return Ok(Vec::new());
        }

        let principals = match criteria.principal_equals.as_deref() {
            Some(principal) => match PrincipalName::new(principal) {
                Ok(principal) => vec![principal],
                Err(_) => return Ok(Vec::new()),
            },
            None => self.directory.list_principals().await?.into_iter().collect(),
        };

        let mut matches = Vec::new();
        for principal in &principals {
            let events = match self.cache.get(principal).await {
                Ok(events) => events,
                Err(load_error) => {
                    error!(
                        principal = %principal,
                        error = %load_error,
                        "failed to load audit log; excluding principal from search"
                    );
                    continue;
                }
            };

            matches.extend(
                events
                    .iter()
                    .filter(|event| criteria.matches(event, self.calendar))
                    .cloned(),
            );
        }

        sort_newest_first(&mut matches);
        debug!(
            principal_count = principals.len(),
            result_count = matches.len(),
            "audit search completed"
        );
        Ok(matches)
    }

    /// Lists every principal that owns a log.
    pub async fn list_principals(&self) -> AppResult<Vec<String>> {
        Ok(self
            .directory
            .list_principals()
            .await?
            .into_iter()
            .map(|principal| principal.as_str().to_owned())
            .collect())
    }

    /// Returns one principal's events in append order.
    pub async fn events_for_principal(&self, principal: &str) -> AppResult<Vec<AuditEvent>> {
        let principal = PrincipalName::new(principal)?;
        Ok(self.cache.get(&principal).await?.to_vec())
    }

    /// Resolves the original filename recorded for a stored object, falling
    /// back to the storage key when no event names it.
    pub async fn original_subject_name(
        &self,
        principal: &str,
        storage_key: &str,
    ) -> AppResult<String> {
        let principal = PrincipalName::new(principal)?;
        let events = self.cache.get(&principal).await?;

        Ok(events
            .iter()
            .find(|event| event.storage_key == storage_key && !event.subject_name.is_empty())
            .map_or_else(|| storage_key.to_owned(), |event| event.subject_name.clone()))
    }

    /// Drops every cached log; the next read reloads from storage.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self, principal: &str) -> bool {
        PrincipalName::new(principal).is_ok_and(|principal| self.cache.is_cached(&principal))
    }
}
