//! Handlers for `/widgets` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/widgets` | Optional `?content_object=<form or dataview url>` |
//! | `POST`   | `/widgets` | 201; needs change rights on the owner's project |
//! | `GET`    | `/widgets/{id}` | 404 if absent or hidden |
//! | `PUT`    | `/widgets/{id}` | All mandatory fields required |
//! | `PATCH`  | `/widgets/{id}` | Only the given fields change |
//! | `DELETE` | `/widgets/{id}` | 204 |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use fieldwork_core::{
  permission::Need,
  store::Store,
  validation::{FieldErrors, invalid_choice},
  widget::{NewWidget, ViewType, Widget, WidgetChanges, WidgetQuery, WidgetType},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
  AppState,
  access::{require, resolve_owner},
  auth::Caller,
  error::ApiError,
  input,
  links,
};

const CONTENT_OBJECT: &str = "content_object";

// ─── Representation ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct WidgetView {
  pub id:             i64,
  pub url:            String,
  pub key:            String,
  pub content_object: String,
  pub widget_type:    WidgetType,
  pub view_type:      ViewType,
  pub column:         String,
  pub group_by:       Option<String>,
  pub aggregation:    Option<String>,
  pub title:          Option<String>,
  pub description:    Option<String>,
  pub order:          i64,
  pub metadata:       Value,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl WidgetView {
  fn render(w: Widget, base: &str) -> Self {
    Self {
      id:             w.id,
      url:            links::api_url(base, "widgets", w.id),
      key:            w.key,
      content_object: links::owner_url(base, w.owner),
      widget_type:    w.widget_type,
      view_type:      w.view_type,
      column:         w.column,
      group_by:       w.group_by,
      aggregation:    w.aggregation,
      title:          w.title,
      description:    w.description,
      order:          w.order,
      metadata:       w.metadata,
      created_at:     w.created_at,
      updated_at:     w.updated_at,
    }
  }
}

/// Request body for create, replace and partial update. Fields stay raw
/// JSON until validation so that missing or mistyped fields are reported
/// together, per field.
#[derive(Debug, Default, Deserialize)]
pub struct WidgetBody {
  pub content_object: Option<Value>,
  pub widget_type:    Option<Value>,
  pub view_type:      Option<Value>,
  pub column:         Option<Value>,
  pub group_by:       Option<Value>,
  pub aggregation:    Option<Value>,
  pub title:          Option<Value>,
  pub description:    Option<Value>,
  pub metadata:       Option<Value>,
}

/// The free-text display fields shared by every write.
struct Display {
  group_by:    Option<String>,
  aggregation: Option<String>,
  title:       Option<String>,
  description: Option<String>,
}

impl Display {
  fn read(errors: &mut FieldErrors, body: &WidgetBody) -> Self {
    Self {
      group_by:    errors.text("group_by", body.group_by.as_ref()),
      aggregation: errors.text("aggregation", body.aggregation.as_ref()),
      title:       errors.text("title", body.title.as_ref()),
      description: errors.text("description", body.description.as_ref()),
    }
  }
}

// ─── Validation ───────────────────────────────────────────────────────────────

fn check_view_type(
  errors: &mut FieldErrors,
  widget_type: Option<WidgetType>,
  view_type: Option<ViewType>,
) {
  if let (Some(wt), Some(vt)) = (widget_type, view_type)
    && !wt.allows(vt)
  {
    errors.add("view_type", invalid_choice(vt.as_ref()));
  }
}

/// Validate a body that must carry every mandatory field.
async fn validate_full<S: Store>(
  state: &AppState<S>,
  caller: &Caller,
  body: WidgetBody,
) -> Result<NewWidget, ApiError> {
  let mut errors = FieldErrors::new();

  let owner = match errors.required_text(CONTENT_OBJECT, body.content_object.as_ref()) {
    Some(r) => {
      resolve_owner(state, &state.widget_refs, caller, CONTENT_OBJECT, &r, &mut errors).await?
    }
    None => None,
  };
  let widget_type: Option<WidgetType> =
    errors.required_value_choice("widget_type", body.widget_type.as_ref());
  let view_type: Option<ViewType> =
    errors.required_value_choice("view_type", body.view_type.as_ref());
  check_view_type(&mut errors, widget_type, view_type);
  let column = errors.required_text("column", body.column.as_ref());
  let display = Display::read(&mut errors, &body);

  match (owner, widget_type, view_type, column) {
    (Some(owner), Some(widget_type), Some(view_type), Some(column)) if errors.is_empty() => {
      let mut widget = NewWidget::new(owner, widget_type, view_type, column);
      widget.group_by = display.group_by;
      widget.aggregation = display.aggregation;
      widget.title = display.title;
      widget.description = display.description;
      if let Some(metadata) = body.metadata {
        widget.metadata = metadata;
      }
      Ok(widget)
    }
    _ => Err(errors.into()),
  }
}

/// Validate only the fields present in `body`, checked against `current`
/// where fields depend on each other.
async fn validate_partial<S: Store>(
  state: &AppState<S>,
  caller: &Caller,
  current: &Widget,
  body: WidgetBody,
) -> Result<WidgetChanges, ApiError> {
  let mut errors = FieldErrors::new();

  let owner = match body
    .content_object
    .as_ref()
    .and_then(|v| errors.present_text(CONTENT_OBJECT, v))
  {
    Some(r) => {
      resolve_owner(state, &state.widget_refs, caller, CONTENT_OBJECT, &r, &mut errors).await?
    }
    None => None,
  };
  let widget_type: Option<WidgetType> =
    errors.value_choice("widget_type", body.widget_type.as_ref());
  let view_type: Option<ViewType> = errors.value_choice("view_type", body.view_type.as_ref());
  if widget_type.is_some() || view_type.is_some() {
    check_view_type(
      &mut errors,
      Some(widget_type.unwrap_or(current.widget_type)),
      Some(view_type.unwrap_or(current.view_type)),
    );
  }
  let column = body
    .column
    .as_ref()
    .and_then(|v| errors.present_text("column", v));
  let display = Display::read(&mut errors, &body);

  errors.finish(WidgetChanges {
    owner,
    widget_type,
    view_type,
    column,
    group_by: display.group_by,
    aggregation: display.aggregation,
    title: display.title,
    description: display.description,
    metadata: body.metadata,
  })
  .map_err(ApiError::from)
}

/// Fetch widget `id` and check the caller may do `need` to it.
async fn load<S: Store>(
  state: &AppState<S>,
  caller: &Caller,
  id: i64,
  need: Need,
) -> Result<Widget, ApiError> {
  let widget = state
    .store
    .get_widget(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::NotFound)?;
  require(state, caller, widget.owner.project_id, need).await?;
  Ok(widget)
}

/// Store `changes` into widget `id` after checking rights on any new owner.
async fn apply<S: Store>(
  state: &AppState<S>,
  caller: &Caller,
  current: &Widget,
  changes: WidgetChanges,
) -> Result<Json<WidgetView>, ApiError> {
  if let Some(owner) = changes.owner
    && owner.project_id != current.owner.project_id
  {
    require(state, caller, owner.project_id, Need::Change).await?;
  }
  let widget = state
    .store
    .update_widget(current.id, changes)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::NotFound)?;
  Ok(Json(WidgetView::render(widget, state.base_url())))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub content_object: Option<String>,
}

/// `GET /widgets[?content_object=<url>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<WidgetView>>, ApiError>
where
  S: Store + Clone + 'static,
{
  let owner = params
    .content_object
    .as_deref()
    .map(|r| state.widget_refs.parse(r))
    .transpose()
    .map_err(|e| FieldErrors::single(CONTENT_OBJECT, e.to_string()))?;

  let query = WidgetQuery { owner, visible_to: Some(caller.username) };
  let widgets = state
    .store
    .list_widgets(&query)
    .await
    .map_err(ApiError::store)?;

  let base = state.base_url();
  Ok(Json(widgets.into_iter().map(|w| WidgetView::render(w, base)).collect()))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /widgets`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  body: Result<Json<WidgetBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store + Clone + 'static,
{
  let fields = validate_full(&state, &caller, input::json(body)?).await?;
  require(&state, &caller, fields.owner.project_id, Need::Change).await?;

  let widget = state
    .store
    .create_widget(fields)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(WidgetView::render(widget, state.base_url()))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /widgets/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
) -> Result<Json<WidgetView>, ApiError>
where
  S: Store + Clone + 'static,
{
  let widget = load(&state, &caller, id, Need::View).await?;
  Ok(Json(WidgetView::render(widget, state.base_url())))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /widgets/{id}`
pub async fn replace<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
  body: Result<Json<WidgetBody>, JsonRejection>,
) -> Result<Json<WidgetView>, ApiError>
where
  S: Store + Clone + 'static,
{
  let current = load(&state, &caller, id, Need::Change).await?;
  let fields = validate_full(&state, &caller, input::json(body)?).await?;
  debug!(widget_id = id, "replacing widget");
  apply(&state, &caller, &current, fields.into()).await
}

/// `PATCH /widgets/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
  body: Result<Json<WidgetBody>, JsonRejection>,
) -> Result<Json<WidgetView>, ApiError>
where
  S: Store + Clone + 'static,
{
  let current = load(&state, &caller, id, Need::Change).await?;
  let changes = validate_partial(&state, &caller, &current, input::json(body)?).await?;
  apply(&state, &caller, &current, changes).await
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /widgets/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: Store + Clone + 'static,
{
  let widget = load(&state, &caller, id, Need::Change).await?;
  if !state
    .store
    .delete_widget(widget.id)
    .await
    .map_err(ApiError::store)?
  {
    return Err(ApiError::NotFound);
  }
  Ok(StatusCode::NO_CONTENT)
}
