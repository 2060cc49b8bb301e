//! Widgets: saved visualisations of one column of a form or dataview.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::owner::{Owner, OwnerKind};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WidgetType {
  Charts,
}

impl WidgetType {
  /// View types this widget type can be rendered as.
  pub fn view_types(self) -> &'static [ViewType] {
    match self {
      Self::Charts => &[
        ViewType::HorizontalBar,
        ViewType::VerticalBar,
        ViewType::Pie,
        ViewType::Line,
      ],
    }
  }

  pub fn allows(self, view_type: ViewType) -> bool {
    self.view_types().contains(&view_type)
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ViewType {
  HorizontalBar,
  VerticalBar,
  Pie,
  Line,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Widget {
  pub id:          i64,
  /// 32-character hex token, unique across all widgets.
  pub key:         String,
  pub owner:       Owner,
  pub widget_type: WidgetType,
  pub view_type:   ViewType,
  /// The data field being visualised.
  pub column:      String,
  pub group_by:    Option<String>,
  pub aggregation: Option<String>,
  pub title:       Option<String>,
  pub description: Option<String>,
  /// Position among the widgets of the same owner.
  pub order:       i64,
  pub metadata:    serde_json::Value,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::Store::create_widget`]. The store assigns `id`,
/// `key`, `order` and timestamps.
#[derive(Debug, Clone)]
pub struct NewWidget {
  pub owner:       Owner,
  pub widget_type: WidgetType,
  pub view_type:   ViewType,
  pub column:      String,
  pub group_by:    Option<String>,
  pub aggregation: Option<String>,
  pub title:       Option<String>,
  pub description: Option<String>,
  pub metadata:    serde_json::Value,
}

impl NewWidget {
  pub fn new(
    owner: Owner,
    widget_type: WidgetType,
    view_type: ViewType,
    column: impl Into<String>,
  ) -> Self {
    Self {
      owner,
      widget_type,
      view_type,
      column: column.into(),
      group_by: None,
      aggregation: None,
      title: None,
      description: None,
      metadata: serde_json::Value::Object(Default::default()),
    }
  }
}

/// A merge applied by [`crate::store::Store::update_widget`]; `None` fields
/// keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct WidgetChanges {
  pub owner:       Option<Owner>,
  pub widget_type: Option<WidgetType>,
  pub view_type:   Option<ViewType>,
  pub column:      Option<String>,
  pub group_by:    Option<String>,
  pub aggregation: Option<String>,
  pub title:       Option<String>,
  pub description: Option<String>,
  pub metadata:    Option<serde_json::Value>,
}

impl From<NewWidget> for WidgetChanges {
  fn from(w: NewWidget) -> Self {
    Self {
      owner:       Some(w.owner),
      widget_type: Some(w.widget_type),
      view_type:   Some(w.view_type),
      column:      Some(w.column),
      group_by:    w.group_by,
      aggregation: w.aggregation,
      title:       w.title,
      description: w.description,
      metadata:    Some(w.metadata),
    }
  }
}

/// Parameters for [`crate::store::Store::list_widgets`].
#[derive(Debug, Clone, Default)]
pub struct WidgetQuery {
  pub owner:      Option<(OwnerKind, i64)>,
  /// Restrict to widgets in projects where this user holds any role.
  pub visible_to: Option<String>,
}
