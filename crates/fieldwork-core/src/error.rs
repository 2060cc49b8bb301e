//! Error types for `fieldwork-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The reference names a kind that is not registered with the resolver,
  /// or cannot be decoded into a kind and an id at all.
  #[error("Could not determine a valid serializer for value '{0}'.")]
  UnsupportedReferenceKind(String),

  /// The kind is registered but no entity of that kind has the given id.
  #[error("reference does not resolve to an existing object: {0}")]
  ReferenceNotFound(String),

  #[error("unknown {field} discriminant: {value:?}")]
  UnknownDiscriminant { field: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
