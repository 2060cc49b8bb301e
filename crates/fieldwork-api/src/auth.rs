//! HTTP Basic-auth extractor and standalone verifier.

use std::collections::HashMap;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use fieldwork_core::store::Store;
use tracing::debug;

use crate::{AppState, error::ApiError};

/// Accounts accepted by this server instance.
#[derive(Clone, Default)]
pub struct AuthConfig {
  /// Username → argon2 PHC string, e.g. `$argon2id$v=19$…`
  pub users: HashMap<String, String>,
}

/// The authenticated user making a request. Role grants are looked up by
/// this username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
  pub username: String,
}

/// Verify Basic credentials against the configured accounts.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Caller, ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let stored = config.users.get(username).ok_or_else(|| {
    debug!(%username, "unknown user");
    ApiError::Unauthorized
  })?;

  let parsed_hash = PasswordHash::new(stored).map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(Caller { username: username.to_owned() })
}

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: Store + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth)
  }
}
