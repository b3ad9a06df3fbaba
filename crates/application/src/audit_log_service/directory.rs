use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use coffer_core::AppResult;
use coffer_domain::PrincipalName;

use crate::storage_ports::{ObjectStore, join_object_path};

const LOG_SUFFIX: &str = ".csv";

/// Maps principals to log paths and discovers principals from stored logs.
#[derive(Clone)]
pub(crate) struct PrincipalDirectory {
    store: Arc<dyn ObjectStore>,
    root: String,
}

impl PrincipalDirectory {
    pub(crate) fn new(store: Arc<dyn ObjectStore>, root: &str) -> Self {
        Self {
            store,
            root: root.trim_matches('/').to_owned(),
        }
    }

    /// Returns `<root>/<principal>.csv`.
    pub(crate) fn log_path(&self, principal: &PrincipalName) -> String {
        join_object_path(&[
            self.root.as_str(),
            format!("{}{LOG_SUFFIX}", principal.as_str()).as_str(),
        ])
    }

    /// Recovers the principal from a log path, or `None` for unrelated objects.
    pub(crate) fn principal_from_path(&self, path: &str) -> Option<PrincipalName> {
        let relative = if self.root.is_empty() {
            path
        } else {
            path.strip_prefix(self.root.as_str())?.strip_prefix('/')?
        };

        if relative.contains('/') {
            return None;
        }

        let stem = relative.strip_suffix(LOG_SUFFIX)?;
        PrincipalName::new(stem).ok()
    }

    /// Lists every principal with a log under the root.
    pub(crate) async fn list_principals(&self) -> AppResult<BTreeSet<PrincipalName>> {
        let paths = self.store.list(self.root.as_str()).await?;
        let principals: BTreeSet<PrincipalName> = paths
            .iter()
            .filter_map(|path| {
                let principal = self.principal_from_path(path);
                if principal.is_none() {
                    debug!(path = %path, "ignoring non-log object under audit root");
                }
                principal
            })
            .collect();

        Ok(principals)
    }
}
