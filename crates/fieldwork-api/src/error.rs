//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use fieldwork_core::{
  permission::Denial,
  store::StoreError,
  validation::{FieldErrors, NON_FIELD_ERRORS},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  /// Absent, or present but invisible to the caller.
  #[error("not found")]
  NotFound,

  #[error("forbidden")]
  Forbidden,

  #[error("invalid input: {0}")]
  Validation(FieldErrors),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E: StoreError>(err: E) -> Self { Self::Store(Box::new(err)) }

  /// Like [`ApiError::store`], but a unique-key collision on `fields` is
  /// reported to the caller as a validation error.
  pub fn unique<E: StoreError>(err: E, fields: &str) -> Self {
    if err.is_conflict() {
      Self::Validation(FieldErrors::single(
        NON_FIELD_ERRORS,
        format!("The fields {fields} must make a unique set."),
      ))
    } else {
      Self::store(err)
    }
  }
}

impl From<Denial> for ApiError {
  fn from(denial: Denial) -> Self {
    match denial {
      Denial::Hidden => Self::NotFound,
      Denial::Forbidden => Self::Forbidden,
    }
  }
}

impl From<FieldErrors> for ApiError {
  fn from(errors: FieldErrors) -> Self { Self::Validation(errors) }
}

fn detail(status: StatusCode, message: &str) -> Response {
  (status, Json(json!({ "detail": message }))).into_response()
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Unauthorized => {
        let mut res = detail(
          StatusCode::UNAUTHORIZED,
          "Authentication credentials were not provided.",
        );
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"fieldwork\""),
        );
        res
      }
      ApiError::NotFound => detail(StatusCode::NOT_FOUND, "Not found."),
      ApiError::Forbidden => detail(
        StatusCode::FORBIDDEN,
        "You do not have permission to perform this action.",
      ),
      ApiError::Validation(errors) => {
        (StatusCode::BAD_REQUEST, Json(errors)).into_response()
      }
      ApiError::Store(e) => {
        error!(error = %e, "store failure");
        detail(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
      }
    }
  }
}
