//! Request-body extraction.
//!
//! Handlers take `Result<Json<T>, JsonRejection>` and pass it through
//! [`json`], so a body that is not a JSON object of the expected shape is a
//! 400 with a `non_field_errors` entry rather than axum's plain-text 4xx.
//! Field types are checked later, per field, by
//! [`fieldwork_core::validation::FieldErrors`].

use axum::{Json, extract::rejection::JsonRejection};
use fieldwork_core::validation::{FieldErrors, NON_FIELD_ERRORS};

use crate::error::ApiError;

pub fn json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
  result
    .map(|Json(v)| v)
    .map_err(|err| FieldErrors::single(NON_FIELD_ERRORS, err.body_text()).into())
}
