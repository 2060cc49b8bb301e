//! Metadata: typed annotations attached to an owner, at most one per
//! `(owner, data_type)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  owner::{Owner, OwnerKind},
  store::Store,
};

/// The vocabulary of metadata types.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataType {
  EnketoUrl,
  EnketoPreviewUrl,
  FormLicense,
  DataLicense,
  Source,
  PublicLink,
  SupportingDoc,
  Media,
  MapboxLayer,
  ExternalExport,
  Textit,
  GoogleSheets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaData {
  pub id:               i64,
  pub owner:            Owner,
  pub data_type:        DataType,
  pub data_value:       String,
  pub data_title:       Option<String>,
  pub data_description: Option<String>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// Input to [`Store::upsert_metadata`].
///
/// On an existing key, `data_value` always replaces the stored value; the
/// display fields replace theirs only when `Some`.
#[derive(Debug, Clone)]
pub struct MetaDataFields {
  pub data_type:        DataType,
  pub data_value:       String,
  pub data_title:       Option<String>,
  pub data_description: Option<String>,
}

impl MetaDataFields {
  pub fn new(data_type: DataType, data_value: impl Into<String>) -> Self {
    Self {
      data_type,
      data_value: data_value.into(),
      data_title: None,
      data_description: None,
    }
  }
}

/// Partial update by primary key; `None` leaves a field as stored.
#[derive(Debug, Clone, Default)]
pub struct MetaDataChanges {
  pub data_type:        Option<DataType>,
  pub data_value:       Option<String>,
  pub data_title:       Option<String>,
  pub data_description: Option<String>,
}

/// Result of an upsert: the stored record and whether this call created it.
#[derive(Debug, Clone)]
pub struct Upserted<T> {
  pub record:  T,
  pub created: bool,
}

/// Parameters for [`Store::list_metadata`].
#[derive(Debug, Clone, Default)]
pub struct MetaDataQuery {
  pub owner:      Option<(OwnerKind, i64)>,
  pub data_type:  Option<DataType>,
  /// Restrict to records in projects where this user holds any role.
  pub visible_to: Option<String>,
}

// ─── Convenience operations ──────────────────────────────────────────────────

/// Set the single `data_type` record for `owner` to `data_value`, creating it
/// if needed.
pub async fn unique_type_for_owner<S: Store>(
  store: &S,
  owner: Owner,
  data_type: DataType,
  data_value: &str,
) -> Result<MetaData, S::Error> {
  let upserted = store
    .upsert_metadata(owner, MetaDataFields::new(data_type, data_value))
    .await?;
  Ok(upserted.record)
}

/// With a value: store it and return the record. Without: return whatever
/// is currently stored.
async fn set_or_get<S: Store>(
  store: &S,
  owner: Owner,
  data_type: DataType,
  value: Option<&str>,
) -> Result<Option<MetaData>, S::Error> {
  match value {
    Some(v) => unique_type_for_owner(store, owner, data_type, v).await.map(Some),
    None => store.find_metadata(owner, data_type).await,
  }
}

pub async fn enketo_url<S: Store>(
  store: &S,
  owner: Owner,
  url: Option<&str>,
) -> Result<Option<MetaData>, S::Error> {
  set_or_get(store, owner, DataType::EnketoUrl, url).await
}

pub async fn enketo_preview_url<S: Store>(
  store: &S,
  owner: Owner,
  url: Option<&str>,
) -> Result<Option<MetaData>, S::Error> {
  set_or_get(store, owner, DataType::EnketoPreviewUrl, url).await
}

pub async fn form_license<S: Store>(
  store: &S,
  owner: Owner,
  license: Option<&str>,
) -> Result<Option<MetaData>, S::Error> {
  set_or_get(store, owner, DataType::FormLicense, license).await
}

pub async fn data_license<S: Store>(
  store: &S,
  owner: Owner,
  license: Option<&str>,
) -> Result<Option<MetaData>, S::Error> {
  set_or_get(store, owner, DataType::DataLicense, license).await
}

pub async fn source<S: Store>(
  store: &S,
  owner: Owner,
  value: Option<&str>,
) -> Result<Option<MetaData>, S::Error> {
  set_or_get(store, owner, DataType::Source, value).await
}

/// Whether the owner is publicly shared. Stored as `"True"` / `"False"`;
/// absent means not shared.
pub async fn public_link<S: Store>(
  store: &S,
  owner: Owner,
  enabled: Option<bool>,
) -> Result<bool, S::Error> {
  let value = enabled.map(|on| if on { "True" } else { "False" });
  let current = set_or_get(store, owner, DataType::PublicLink, value).await?;
  Ok(current.is_some_and(|m| m.data_value == "True"))
}
