use std::sync::Arc;

use coffer_application::FileIntakeService;

use crate::auth::CredentialStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub file_intake_service: FileIntakeService,
    pub credentials: Arc<CredentialStore>,
}
