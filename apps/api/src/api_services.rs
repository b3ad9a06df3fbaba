use std::sync::Arc;

use coffer_application::{
    AuditLogConfig, AuditLogService, DEFAULT_PAGE_SIZE, FileIntakeConfig, FileIntakeService,
    ObjectStore,
};
use coffer_core::AppResult;
use coffer_infrastructure::{InMemoryObjectStore, LocalObjectStore};
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StorageBackend};
use crate::auth::CredentialStore;
use crate::state::AppState;

pub async fn build_app_state(config: &ApiConfig) -> AppResult<AppState> {
    let store = build_object_store(config).await?;

    let audit_log_service = AuditLogService::new(
        store.clone(),
        AuditLogConfig::new(config.audit_prefix.as_str(), config.calendar),
    );
    let file_intake_service = FileIntakeService::new(
        store,
        audit_log_service,
        FileIntakeConfig {
            files_root: config.files_prefix.clone(),
            max_file_size_bytes: config.max_file_size_bytes,
            allowed_content_types: config.allowed_content_types.clone(),
            calendar: config.calendar,
            page_size: DEFAULT_PAGE_SIZE,
        },
    );

    Ok(AppState {
        file_intake_service,
        credentials: Arc::new(CredentialStore::new(
            config.user_account.clone(),
            config.admin_account.clone(),
        )),
    })
}

async fn build_object_store(config: &ApiConfig) -> AppResult<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        StorageBackend::Local => {
            let store = LocalObjectStore::open(config.storage_root_dir.clone()).await?;
            info!(root = %store.root().display(), "using local object storage");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            warn!("using in-memory object storage; uploads and audit logs are lost on restart");
            Ok(Arc::new(InMemoryObjectStore::new()))
        }
    }
}
