//! Error type for `fieldwork-store-sqlite`.

use fieldwork_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] fieldwork_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("project not found: {0}")]
  ProjectNotFound(i64),

  #[error("form not found: {0}")]
  FormNotFound(i64),

  /// A write would have duplicated a `UNIQUE` key.
  #[error("unique constraint violated: {0}")]
  Conflict(String),
}

impl Error {
  /// Reclassify a `UNIQUE` constraint failure as [`Error::Conflict`].
  /// Everything else, including foreign-key failures, passes through.
  pub(crate) fn from_write(err: tokio_rusqlite::Error) -> Self {
    match &err {
      tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, msg))
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
      {
        Self::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
      }
      _ => Self::Database(err),
    }
  }
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Self::Conflict(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
