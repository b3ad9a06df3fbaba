use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use coffer_core::AppError;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{auth, handlers, middleware};

mod cors;

#[cfg(test)]
mod tests;

pub fn build_router(
    app_state: AppState,
    frontend_url: &str,
    body_limit_bytes: usize,
) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route("/api/me", get(auth::me_handler))
        .route(
            "/api/files",
            get(handlers::files::list_files_handler).post(handlers::files::upload_file_handler),
        )
        .route(
            "/api/files/{owner}/{storage_name}",
            get(handlers::files::download_file_handler),
        )
        .route("/api/audit", get(handlers::audit::search_audit_handler))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_auth,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
