use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use coffer_core::AppError;

use super::ApiError;

#[test]
fn app_errors_map_to_http_statuses() {
    let cases = [
        (AppError::Validation("bad".to_owned()), StatusCode::BAD_REQUEST),
        (AppError::NotFound("gone".to_owned()), StatusCode::NOT_FOUND),
        (AppError::Unauthorized("who".to_owned()), StatusCode::UNAUTHORIZED),
        (AppError::Forbidden("no".to_owned()), StatusCode::FORBIDDEN),
        (
            AppError::PayloadTooLarge("big".to_owned()),
            StatusCode::PAYLOAD_TOO_LARGE,
        ),
        (
            AppError::UnsupportedMediaType("exe".to_owned()),
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ),
        (
            AppError::Storage("disk".to_owned()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            AppError::Internal("bug".to_owned()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (error, expected) in cases {
        assert_eq!(ApiError(error).into_response().status(), expected);
    }
}

#[test]
fn unauthorized_response_challenges_for_basic_auth() {
    let response = ApiError(AppError::Unauthorized("missing".to_owned())).into_response();

    let challenge = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(challenge.starts_with("Basic"));
}

#[test]
fn forbidden_response_has_no_challenge() {
    let response = ApiError(AppError::Forbidden("admin only".to_owned())).into_response();

    assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
}
