//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, enums as their wire names, and
//! structured fields (dataview columns, widget metadata) as compact JSON.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use fieldwork_core::{
  metadata::MetaData,
  owner::{DataView, Form, Owner, Project},
  widget::Widget,
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Parse a stored enum wire name, e.g. an owner kind or a role.
pub fn decode_enum<T: FromStr>(field: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    fieldwork_core::Error::UnknownDiscriminant { field, value: s.to_owned() }
      .into()
  })
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_columns(columns: &[String]) -> Result<String> {
  Ok(serde_json::to_string(columns)?)
}

pub fn encode_json(value: &serde_json::Value) -> String { value.to_string() }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const PROJECT_COLUMNS: &str = "project_id, name, created_by, created_at";

/// Raw values read directly from a `projects` row.
pub struct RawProject {
  pub project_id: i64,
  pub name:       String,
  pub created_by: String,
  pub created_at: String,
}

impl RawProject {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      project_id: row.get(0)?,
      name:       row.get(1)?,
      created_by: row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_project(self) -> Result<Project> {
    Ok(Project {
      id:         self.project_id,
      name:       self.name,
      created_by: self.created_by,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const FORM_COLUMNS: &str = "form_id, project_id, title, id_string, created_at";

pub struct RawForm {
  pub form_id:    i64,
  pub project_id: i64,
  pub title:      String,
  pub id_string:  String,
  pub created_at: String,
}

impl RawForm {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      form_id:    row.get(0)?,
      project_id: row.get(1)?,
      title:      row.get(2)?,
      id_string:  row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_form(self) -> Result<Form> {
    Ok(Form {
      id:         self.form_id,
      project_id: self.project_id,
      title:      self.title,
      id_string:  self.id_string,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const DATAVIEW_COLUMNS: &str =
  "dataview_id, form_id, project_id, name, columns, created_at";

pub struct RawDataView {
  pub dataview_id: i64,
  pub form_id:     i64,
  pub project_id:  i64,
  pub name:        String,
  pub columns:     String,
  pub created_at:  String,
}

impl RawDataView {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      dataview_id: row.get(0)?,
      form_id:     row.get(1)?,
      project_id:  row.get(2)?,
      name:        row.get(3)?,
      columns:     row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_dataview(self) -> Result<DataView> {
    Ok(DataView {
      id:         self.dataview_id,
      form_id:    self.form_id,
      project_id: self.project_id,
      name:       self.name,
      columns:    serde_json::from_str(&self.columns)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const METADATA_COLUMNS: &str = "metadata_id, owner_kind, owner_id, project_id, \
   data_type, data_value, data_title, data_description, created_at, updated_at";

/// Raw values read directly from a `metadata` row.
pub struct RawMetaData {
  pub metadata_id:      i64,
  pub owner_kind:       String,
  pub owner_id:         i64,
  pub project_id:       i64,
  pub data_type:        String,
  pub data_value:       String,
  pub data_title:       Option<String>,
  pub data_description: Option<String>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawMetaData {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      metadata_id:      row.get(0)?,
      owner_kind:       row.get(1)?,
      owner_id:         row.get(2)?,
      project_id:       row.get(3)?,
      data_type:        row.get(4)?,
      data_value:       row.get(5)?,
      data_title:       row.get(6)?,
      data_description: row.get(7)?,
      created_at:       row.get(8)?,
      updated_at:       row.get(9)?,
    })
  }

  pub fn into_metadata(self) -> Result<MetaData> {
    Ok(MetaData {
      id:               self.metadata_id,
      owner:            Owner {
        kind:       decode_enum("owner_kind", &self.owner_kind)?,
        id:         self.owner_id,
        project_id: self.project_id,
      },
      data_type:        decode_enum("data_type", &self.data_type)?,
      data_value:       self.data_value,
      data_title:       self.data_title,
      data_description: self.data_description,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

pub const WIDGET_COLUMNS: &str = "widget_id, widget_key, owner_kind, owner_id, \
   project_id, widget_type, view_type, column_name, group_by, aggregation, \
   title, description, display_order, metadata, created_at, updated_at";

/// Raw values read directly from a `widgets` row.
pub struct RawWidget {
  pub widget_id:     i64,
  pub widget_key:    String,
  pub owner_kind:    String,
  pub owner_id:      i64,
  pub project_id:    i64,
  pub widget_type:   String,
  pub view_type:     String,
  pub column_name:   String,
  pub group_by:      Option<String>,
  pub aggregation:   Option<String>,
  pub title:         Option<String>,
  pub description:   Option<String>,
  pub display_order: i64,
  pub metadata:      String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawWidget {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      widget_id:     row.get(0)?,
      widget_key:    row.get(1)?,
      owner_kind:    row.get(2)?,
      owner_id:      row.get(3)?,
      project_id:    row.get(4)?,
      widget_type:   row.get(5)?,
      view_type:     row.get(6)?,
      column_name:   row.get(7)?,
      group_by:      row.get(8)?,
      aggregation:   row.get(9)?,
      title:         row.get(10)?,
      description:   row.get(11)?,
      display_order: row.get(12)?,
      metadata:      row.get(13)?,
      created_at:    row.get(14)?,
      updated_at:    row.get(15)?,
    })
  }

  pub fn into_widget(self) -> Result<Widget> {
    Ok(Widget {
      id:          self.widget_id,
      key:         self.widget_key,
      owner:       Owner {
        kind:       decode_enum("owner_kind", &self.owner_kind)?,
        id:         self.owner_id,
        project_id: self.project_id,
      },
      widget_type: decode_enum("widget_type", &self.widget_type)?,
      view_type:   decode_enum("view_type", &self.view_type)?,
      column:      self.column_name,
      group_by:    self.group_by,
      aggregation: self.aggregation,
      title:       self.title,
      description: self.description,
      order:       self.display_order,
      metadata:    serde_json::from_str(&self.metadata)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}
