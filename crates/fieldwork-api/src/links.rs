//! Absolute URLs rendered into responses.

use fieldwork_core::owner::Owner;

/// `{base}/api/v1/{segment}/{id}`
pub fn api_url(base: &str, segment: &str, id: i64) -> String {
  format!("{}/api/v1/{segment}/{id}", base.trim_end_matches('/'))
}

/// The reference a client would send to name `owner`.
pub fn owner_url(base: &str, owner: Owner) -> String {
  api_url(base, owner.kind.segment(), owner.id)
}
