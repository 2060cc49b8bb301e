//! Directory entities (projects, forms, dataviews) and the [`Owner`] handle
//! that widgets and metadata attach to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ─── Owner kinds ─────────────────────────────────────────────────────────────

/// The closed set of entity kinds an attachment may point at.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OwnerKind {
  Form,
  DataView,
  Project,
}

impl OwnerKind {
  /// The URL path segment naming a collection of this kind, e.g. `forms`.
  pub fn segment(self) -> &'static str {
    match self {
      Self::Form => "forms",
      Self::DataView => "dataviews",
      Self::Project => "projects",
    }
  }
}

// ─── Owner ───────────────────────────────────────────────────────────────────

/// A resolved, existing entity that a dependent record attaches to.
///
/// `(kind, id)` identifies the owner. `project_id` is the project whose role
/// grants decide who may see records attached to it; for a project owner it
/// is the project's own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
  pub kind:       OwnerKind,
  pub id:         i64,
  pub project_id: i64,
}

impl Owner {
  pub fn key(&self) -> (OwnerKind, i64) { (self.kind, self.id) }
}

impl From<&Project> for Owner {
  fn from(p: &Project) -> Self {
    Self { kind: OwnerKind::Project, id: p.id, project_id: p.id }
  }
}

impl From<&Form> for Owner {
  fn from(f: &Form) -> Self {
    Self { kind: OwnerKind::Form, id: f.id, project_id: f.project_id }
  }
}

impl From<&DataView> for Owner {
  fn from(d: &DataView) -> Self {
    Self { kind: OwnerKind::DataView, id: d.id, project_id: d.project_id }
  }
}

// ─── Directory entities ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
  pub id:         i64,
  pub name:       String,
  /// Username of the creator; granted the `owner` role on creation.
  pub created_by: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
  pub id:         i64,
  pub project_id: i64,
  pub title:      String,
  /// Unique within the project.
  pub id_string:  String,
  pub created_at: DateTime<Utc>,
}

/// A filtered projection over a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataView {
  pub id:         i64,
  pub form_id:    i64,
  /// Copied from the underlying form.
  pub project_id: i64,
  pub name:       String,
  pub columns:    Vec<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewForm {
  pub project_id: i64,
  pub title:      String,
  pub id_string:  String,
}

#[derive(Debug, Clone)]
pub struct NewDataView {
  pub form_id: i64,
  pub name:    String,
  pub columns: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_strings_round_trip() {
    for kind in [OwnerKind::Form, OwnerKind::DataView, OwnerKind::Project] {
      let s = kind.to_string();
      assert_eq!(s.parse::<OwnerKind>().unwrap(), kind);
    }
    assert_eq!(OwnerKind::DataView.as_ref(), "dataview");
    assert_eq!(OwnerKind::DataView.segment(), "dataviews");
  }

  #[test]
  fn project_owns_itself() {
    let p = Project {
      id:         7,
      name:       "p".into(),
      created_by: "bob".into(),
      created_at: Utc::now(),
    };
    let owner = Owner::from(&p);
    assert_eq!(owner.key(), (OwnerKind::Project, 7));
    assert_eq!(owner.project_id, 7);
  }
}
