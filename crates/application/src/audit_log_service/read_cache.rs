use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use coffer_core::AppResult;
use coffer_domain::{AuditEvent, PrincipalName};

use super::codec::decode_audit_log;
use super::directory::PrincipalDirectory;
use crate::storage_ports::ObjectStore;

#[derive(Debug, Default)]
struct CacheSlot {
    generation: u64,
    events: Option<Arc<[AuditEvent]>>,
}

/// Decoded per-principal logs, valid until the next write to that principal.
///
/// Each slot carries a generation bumped on invalidation. A load publishes its
/// result only if the generation it observed before reading is still current,
/// so a load racing with a write can never reinstate pre-write contents.
pub(crate) struct AuditReadCache {
    store: Arc<dyn ObjectStore>,
    directory: PrincipalDirectory,
    slots: DashMap<String, CacheSlot>,
}

impl AuditReadCache {
    pub(crate) fn new(store: Arc<dyn ObjectStore>, directory: PrincipalDirectory) -> Self {
        Self {
            store,
            directory,
            slots: DashMap::new(),
        }
    }

    /// Returns the principal's events in physical order, loading on a miss.
    pub(crate) async fn get(&self, principal: &PrincipalName) -> AppResult<Arc<[AuditEvent]>> {
        let observed_generation = match self.slots.get(principal.as_str()) {
            Some(slot) => {
                if let Some(events) = &slot.events {
                    return Ok(Arc::clone(events));
                }
                slot.generation
            }
            None => 0,
        };

        let path = self.directory.log_path(principal);
        if !self.store.exists(path.as_str()).await? {
            debug!(principal = %principal, "no audit log for principal");
            return Ok(Arc::from(Vec::new()));
        }

        let text = self.store.read_string(path.as_str()).await?;
        let decoded = decode_audit_log(text.as_str());
        if decoded.skipped_rows > 0 {
            warn!(
                principal = %principal,
                skipped_rows = decoded.skipped_rows,
                "audit log contains malformed rows"
            );
        }

        let events: Arc<[AuditEvent]> = Arc::from(decoded.events);
        debug!(
            principal = %principal,
            event_count = events.len(),
            "loaded audit log"
        );

        let mut slot = self.slots.entry(principal.as_str().to_owned()).or_default();
        if slot.generation == observed_generation {
            slot.events = Some(Arc::clone(&events));
        }

        Ok(events)
    }

    /// Drops the cached events for one principal.
    pub(crate) fn invalidate(&self, principal: &PrincipalName) {
        let mut slot = self.slots.entry(principal.as_str().to_owned()).or_default();
        slot.generation = slot.generation.wrapping_add(1);
        slot.events = None;
    }

    /// Drops every cached log.
    pub(crate) fn clear(&self) {
        self.slots.iter_mut().for_each(|mut slot| {
            slot.generation = slot.generation.wrapping_add(1);
            slot.events = None;
        });
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self, principal: &PrincipalName) -> bool {
        self.slots
            .get(principal.as_str())
            .is_some_and(|slot| slot.events.is_some())
    }
}
