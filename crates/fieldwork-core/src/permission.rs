//! Project-level roles and the visibility rules derived from them.
//!
//! Every widget and metadata record belongs to a project through its owner.
//! A caller with no role on that project must not learn the record exists,
//! so such records are reported as absent rather than forbidden.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// A role granted to a user on a project.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  ReadOnly,
  DataEntry,
  Editor,
  Manager,
  Owner,
}

impl Role {
  pub fn can_view(self) -> bool { true }

  pub fn can_change(self) -> bool { self >= Self::Editor }

  /// May grant roles on the project to other users.
  pub fn can_share(self) -> bool { self >= Self::Manager }
}

/// What a caller may do with records in one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  /// No grant at all; records must look nonexistent.
  Hidden,
  View,
  Change,
}

impl From<Option<Role>> for Access {
  fn from(role: Option<Role>) -> Self {
    match role {
      Some(r) if r.can_change() => Self::Change,
      Some(r) if r.can_view() => Self::View,
      _ => Self::Hidden,
    }
  }
}

/// The capability an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
  View,
  Change,
  Share,
}

/// Why an authorisation check failed. Kept distinct internally even though
/// both render as non-success responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
  /// The caller may not know the record exists.
  Hidden,
  /// The caller can see the record but not perform this operation.
  Forbidden,
}

/// Decide whether a caller holding `role` may perform an operation needing
/// `need`. Visibility is checked first.
pub fn authorize(role: Option<Role>, need: Need) -> Result<(), Denial> {
  let Some(role) = role.filter(|r| r.can_view()) else {
    return Err(Denial::Hidden);
  };
  let allowed = match need {
    Need::View => true,
    Need::Change => role.can_change(),
    Need::Share => role.can_share(),
  };
  if allowed { Ok(()) } else { Err(Denial::Forbidden) }
}
