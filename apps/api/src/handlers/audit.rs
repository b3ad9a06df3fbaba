use axum::Json;
use axum::extract::{Extension, Query, State};
use coffer_core::UserIdentity;

use crate::dto::{AuditEventResponse, AuditQuery};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn search_audit_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEventResponse>>> {
    let criteria = query.criteria()?;
    let events = state
        .file_intake_service
        .search_audit(&user, &criteria)
        .await?
        .into_iter()
        .map(AuditEventResponse::from)
        .collect();

    Ok(Json(events))
}
