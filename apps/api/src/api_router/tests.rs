use std::collections::HashMap;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tower::ServiceExt;

use super::build_router;
use crate::api_config::ApiConfig;
use crate::api_services::build_app_state;

const BOUNDARY: &str = "coffer-test-boundary";

async fn test_router(max_file_size_bytes: &'static str) -> Router {
    let vars = HashMap::from([
        ("STORAGE_BACKEND", "memory"),
        ("MAX_FILE_SIZE_BYTES", max_file_size_bytes),
        ("AUDIT_CALENDAR_UTC_OFFSET_MINUTES", "0"),
        ("DEV_USERNAME", "alice"),
        ("DEV_PASSWORD", "alice-pass"),
        ("ADMIN_USERNAME", "admin"),
        ("ADMIN_PASSWORD", "admin-pass"),
    ]);
    let config = ApiConfig::load_from(|name| vars.get(name).map(|value| (*value).to_owned()))
        .unwrap_or_else(|_| unreachable!());
    let state = build_app_state(&config)
        .await
        .unwrap_or_else(|_| unreachable!());

    build_router(
        state,
        config.frontend_url.as_str(),
        config.request_body_limit(),
    )
    .unwrap_or_else(|_| unreachable!())
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

fn alice() -> String {
    basic("alice", "alice-pass")
}

fn admin() -> String {
    basic("admin", "admin-pass")
}

fn get(uri: &str, authorization: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    builder
        .body(Body::empty())
        .unwrap_or_else(|_| unreachable!())
}

fn upload(filename: &str, content_type: &str, content: &[u8], authorization: String) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/files")
        .header(header::AUTHORIZATION, authorization)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::USER_AGENT, "router-test")
        .header("x-forwarded-for", "198.51.100.4")
        .body(Body::from(body))
        .unwrap_or_else(|_| unreachable!())
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!())
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let router = test_router("1024").await;

    let response = send(&router, get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn protected_routes_challenge_anonymous_callers() {
    let router = test_router("1024").await;

    let response = send(&router, get("/api/me", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn me_reports_role_per_account() {
    let router = test_router("1024").await;

    let user = json_body(send(&router, get("/api/me", Some(alice()))).await).await;
    let administrator = json_body(send(&router, get("/api/me", Some(admin()))).await).await;

    assert_eq!(user["subject"], "alice");
    assert_eq!(user["role"], "user");
    assert_eq!(administrator["is_admin"], true);
}

#[tokio::test]
async fn upload_list_download_and_audit_round_trip() {
    let router = test_router("1024").await;

    let uploaded = send(
        &router,
        upload("notes.txt", "text/plain", b"hello coffer", alice()),
    )
    .await;
    assert_eq!(uploaded.status(), StatusCode::CREATED);
    let uploaded = json_body(uploaded).await;
    assert_eq!(uploaded["status"], "success");
    let storage_name = uploaded["storage_name"].as_str().unwrap_or_default().to_owned();
    assert!(storage_name.ends_with("_notes_txt"));

    let forbidden = send(&router, get("/api/files", Some(alice()))).await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let listing = send(&router, get("/api/files?filename=NOTES&username=alice", Some(admin()))).await;
    assert_eq!(listing.status(), StatusCode::OK);
    let listing = json_body(listing).await;
    assert_eq!(listing["total_results"], 1);
    assert_eq!(listing["items"][0]["original_filename"], "notes.txt");
    assert_eq!(
        listing["items"][0]["download_path"],
        format!("/api/files/alice/{storage_name}")
    );

    let download = send(
        &router,
        get(format!("/api/files/alice/{storage_name}").as_str(), Some(admin())),
    )
    .await;
    assert_eq!(download.status(), StatusCode::OK);
    let disposition = download
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    assert!(disposition.contains("filename=\"notes.txt\""));
    let bytes = to_bytes(download.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    assert_eq!(bytes.as_ref(), b"hello coffer");

    let audit = json_body(
        send(
            &router,
            get("/api/audit?event_type=download", Some(admin())),
        )
        .await,
    )
    .await;
    assert_eq!(audit[0]["actor"], "admin");
    assert_eq!(audit[0]["principal"], "alice");
    assert_eq!(audit[0]["subject_name"], "notes.txt");

    let all_events = json_body(send(&router, get("/api/audit", Some(admin()))).await).await;
    assert_eq!(all_events.as_array().map(Vec::len), Some(2));
    assert_eq!(all_events[1]["origin_address"], "198.51.100.4");
    assert_eq!(all_events[1]["client_descriptor"], "router-test");
}

#[tokio::test]
async fn oversized_request_body_is_rejected() {
    let router = test_router("16").await;
    let content = vec![b'x'; 2 * 1024 * 1024];

    let response = send(&router, upload("big.bin", "application/octet-stream", &content, alice())).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn file_over_configured_limit_is_rejected_by_validation() {
    let router = test_router("16").await;

    let response = send(
        &router,
        upload("big.bin", "application/octet-stream", &[b'x'; 64], alice()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn download_of_unknown_file_is_not_found() {
    let router = test_router("1024").await;

    let response = send(
        &router,
        get("/api/files/alice/2024-01-01T00-00-00_missing", Some(admin())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_date_query_is_a_bad_request() {
    let router = test_router("1024").await;

    let response = send(&router, get("/api/audit?start_date=yesterday", Some(admin()))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
