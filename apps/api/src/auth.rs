use axum::Json;
use axum::extract::Extension;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use coffer_core::{AppError, AppResult, Role, UserIdentity};

use crate::api_config::AccountCredentials;
use crate::dto::UserIdentityResponse;


/// Fixed development accounts checked by HTTP Basic authentication.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    user_account: AccountCredentials,
    admin_account: AccountCredentials,
}

impl CredentialStore {
    pub fn new(user_account: AccountCredentials, admin_account: AccountCredentials) -> Self {
        Self {
            user_account,
            admin_account,
        }
    }

    /// Resolves an `Authorization` header value to the matching account.
    pub fn authenticate(&self, authorization: Option<&str>) -> AppResult<UserIdentity> {
        let (username, password) = parse_basic_authorization(authorization)?;

        if matches_account(&self.admin_account, &username, &password) {
            return Ok(UserIdentity::new(username, Role::Admin));
        }

        if matches_account(&self.user_account, &username, &password) {
            return Ok(UserIdentity::new(username, Role::User));
        }

        Err(AppError::Unauthorized("invalid credentials".to_owned()))
    }
}

pub async fn me_handler(Extension(user): Extension<UserIdentity>) -> Json<UserIdentityResponse> {
    Json(UserIdentityResponse::from(user))
}

fn parse_basic_authorization(authorization: Option<&str>) -> AppResult<(String, String)> {
    let header_value =
        authorization.ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    let (scheme, encoded) = header_value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AppError::Unauthorized("malformed authorization header".to_owned()))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AppError::Unauthorized(format!(
            "unsupported authorization scheme '{scheme}'"
        )));
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|error| AppError::Unauthorized(format!("malformed basic credentials: {error}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| AppError::Unauthorized("basic credentials are not UTF-8".to_owned()))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| AppError::Unauthorized("malformed basic credentials".to_owned()))?;

    Ok((username.to_owned(), password.to_owned()))
}

fn matches_account(account: &AccountCredentials, username: &str, password: &str) -> bool {
    constant_time_eq(account.username.as_bytes(), username.as_bytes())
        & constant_time_eq(account.password.as_bytes(), password.as_bytes())
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter()
        .zip(right)
        .fold(0_u8, |difference, (left, right)| difference | (left ^ right))
        == 0
}
