use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use coffer_application::ClientContext;
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;


const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const SESSION_ID_HEADER: &str = "x-session-id";

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let identity = state.credentials.authenticate(authorization).inspect_err(|error| {
        debug!(path = %request.uri().path(), error = %error, "rejected request credentials");
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Caller details recorded with audit events.
#[derive(Debug, Clone)]
pub struct RequestClient(pub ClientContext);

impl<S> FromRequestParts<S> for RequestClient
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(address)| *address);

        Ok(Self(client_context(&parts.headers, peer)))
    }
}

pub(crate) fn client_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientContext {
    let forwarded_for = header_text(headers, FORWARDED_FOR_HEADER).and_then(|value| {
        value
            .split(',')
            .map(str::trim)
            .find(|hop| !hop.is_empty())
            .map(str::to_owned)
    });

    ClientContext {
        origin_address: forwarded_for.or_else(|| peer.map(|address| address.ip().to_string())),
        client_descriptor: header_text(headers, header::USER_AGENT.as_str()),
        session_token: header_text(headers, SESSION_ID_HEADER),
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
