//! Resolution of caller-supplied references to concrete [`Owner`]s.
//!
//! A reference is an opaque string whose last two path segments name a
//! collection and a numeric id, e.g. `http://host/api/v1/forms/5`. Each
//! resolver carries an explicit registry of the collections it accepts;
//! anything else is rejected with [`Error::UnsupportedReferenceKind`] rather
//! than attached to whatever happens to match.

use std::collections::HashMap;

use thiserror::Error;
use url::Url;

use crate::{
  Error,
  owner::{Owner, OwnerKind},
  store::Store,
};

/// Failure from [`ReferenceResolver::resolve`]: either the reference itself
/// is unusable, or the backing store failed while looking it up.
#[derive(Debug, Error)]
pub enum ResolveError<E> {
  #[error(transparent)]
  Reference(#[from] Error),

  #[error("store error: {0}")]
  Store(#[source] E),
}

/// Split a reference into its collection segment and id.
///
/// Absolute URLs are reduced to their path; relative paths and bare
/// `forms/5` strings are used as-is. Trailing slashes are ignored.
fn decode(reference: &str) -> Option<(String, i64)> {
  let path = match Url::parse(reference) {
    Ok(url) => url.path().to_owned(),
    Err(_) => reference.to_owned(),
  };

  let mut segments = path.split('/').filter(|s| !s.is_empty()).rev();
  let id = segments.next()?.parse::<i64>().ok()?;
  let segment = segments.next()?;
  Some((segment.to_owned(), id))
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// A registry of the owner kinds a particular record type may attach to.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
  kinds: HashMap<&'static str, OwnerKind>,
}

impl ReferenceResolver {
  pub fn new() -> Self { Self::default() }

  /// Accept references to `kind`.
  pub fn register(mut self, kind: OwnerKind) -> Self {
    self.kinds.insert(kind.segment(), kind);
    self
  }

  /// Widgets visualise form data, so they attach to forms and dataviews.
  pub fn for_widgets() -> Self {
    Self::new().register(OwnerKind::Form).register(OwnerKind::DataView)
  }

  /// Metadata may annotate forms, dataviews and projects.
  pub fn for_metadata() -> Self {
    Self::new()
      .register(OwnerKind::Form)
      .register(OwnerKind::DataView)
      .register(OwnerKind::Project)
  }

  pub fn supports(&self, kind: OwnerKind) -> bool {
    self.kinds.get(kind.segment()) == Some(&kind)
  }

  /// Decode `reference` into a registered kind and an id. Does not touch
  /// the store.
  pub fn parse(&self, reference: &str) -> Result<(OwnerKind, i64), Error> {
    decode(reference)
      .and_then(|(segment, id)| {
        self.kinds.get(segment.as_str()).map(|kind| (*kind, id))
      })
      .ok_or_else(|| Error::UnsupportedReferenceKind(reference.to_owned()))
  }

  /// Decode `reference` and fetch the owner it names from `store`.
  pub async fn resolve<S: Store>(
    &self,
    reference: &str,
    store: &S,
  ) -> Result<Owner, ResolveError<S::Error>> {
    let (kind, id) = self.parse(reference)?;
    store
      .lookup_owner(kind, id)
      .await
      .map_err(ResolveError::Store)?
      .ok_or_else(|| Error::ReferenceNotFound(reference.to_owned()).into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_absolute_urls() {
    let r = ReferenceResolver::for_widgets();
    assert_eq!(
      r.parse("http://testserver/api/v1/forms/12").unwrap(),
      (OwnerKind::Form, 12)
    );
    assert_eq!(
      r.parse("https://example.org/api/v1/dataviews/3/").unwrap(),
      (OwnerKind::DataView, 3)
    );
  }

  #[test]
  fn parses_relative_paths() {
    let r = ReferenceResolver::for_metadata();
    assert_eq!(r.parse("/api/v1/projects/4").unwrap(), (OwnerKind::Project, 4));
    assert_eq!(r.parse("forms/9").unwrap(), (OwnerKind::Form, 9));
  }

  #[test]
  fn unregistered_kind_is_rejected_with_reference_echoed() {
    let r = ReferenceResolver::for_widgets();
    let reference = "http://testserver/api/v1/projects/1";
    let err = r.parse(reference).unwrap_err();
    assert!(matches!(err, Error::UnsupportedReferenceKind(ref s) if s == reference));
    assert_eq!(
      err.to_string(),
      "Could not determine a valid serializer for value \
       'http://testserver/api/v1/projects/1'."
    );
  }

  #[test]
  fn undecodable_references_are_unsupported() {
    let r = ReferenceResolver::for_metadata();
    for bad in ["", "forms", "forms/abc", "http://testserver/", "12"] {
      assert!(
        matches!(r.parse(bad), Err(Error::UnsupportedReferenceKind(_))),
        "{bad:?} should be rejected"
      );
    }
  }

  #[test]
  fn registry_is_explicit() {
    let empty = ReferenceResolver::new();
    assert!(!empty.supports(OwnerKind::Form));
    assert!(empty.parse("forms/1").is_err());

    let widgets = ReferenceResolver::for_widgets();
    assert!(widgets.supports(OwnerKind::DataView));
    assert!(!widgets.supports(OwnerKind::Project));
  }
}
