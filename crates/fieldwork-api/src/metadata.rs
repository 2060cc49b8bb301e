//! Handlers for `/metadata` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/metadata` | Optional `?content_object=<url>` and `?data_type=<type>` |
//! | `POST`   | `/metadata` | Upsert on `(content_object, data_type)`: 201 if created, 200 if updated |
//! | `GET`    | `/metadata/{id}` | 404 if absent or hidden |
//! | `PATCH`  | `/metadata/{id}` | The owner is fixed; other fields merge |
//! | `DELETE` | `/metadata/{id}` | 204 |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use fieldwork_core::{
  metadata::{DataType, MetaData, MetaDataChanges, MetaDataFields, MetaDataQuery},
  permission::Need,
  store::Store,
  validation::FieldErrors,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  AppState,
  access::{require, resolve_owner},
  auth::Caller,
  error::ApiError,
  input,
  links,
};

const CONTENT_OBJECT: &str = "content_object";
const UNIQUE_KEY: &str = "content_object, data_type";

#[derive(Debug, Serialize)]
pub struct MetaDataView {
  pub id:               i64,
  pub url:              String,
  pub content_object:   String,
  pub data_type:        DataType,
  pub data_value:       String,
  pub data_title:       Option<String>,
  pub data_description: Option<String>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

impl MetaDataView {
  fn render(md: MetaData, base: &str) -> Self {
    Self {
      id:               md.id,
      url:              links::api_url(base, "metadata", md.id),
      content_object:   links::owner_url(base, md.owner),
      data_type:        md.data_type,
      data_value:       md.data_value,
      data_title:       md.data_title,
      data_description: md.data_description,
      created_at:       md.created_at,
      updated_at:       md.updated_at,
    }
  }
}

async fn load<S: Store>(
  state: &AppState<S>,
  caller: &Caller,
  id: i64,
  need: Need,
) -> Result<MetaData, ApiError> {
  let md = state
    .store
    .get_metadata(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::NotFound)?;
  require(state, caller, md.owner.project_id, need).await?;
  Ok(md)
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub content_object: Option<String>,
  pub data_type:      Option<String>,
}

/// `GET /metadata[?content_object=<url>][&data_type=<type>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<MetaDataView>>, ApiError>
where
  S: Store + Clone + 'static,
{
  let mut errors = FieldErrors::new();
  let owner = match params.content_object.as_deref() {
    Some(r) => match state.metadata_refs.parse(r) {
      Ok(key) => Some(key),
      Err(e) => {
        errors.add(CONTENT_OBJECT, e.to_string());
        None
      }
    },
    None => None,
  };
  let data_type: Option<DataType> = params
    .data_type
    .as_deref()
    .and_then(|v| errors.choice("data_type", v));
  let query = errors.finish(MetaDataQuery {
    owner,
    data_type,
    visible_to: Some(caller.username),
  })?;

  let records = state
    .store
    .list_metadata(&query)
    .await
    .map_err(ApiError::store)?;

  let base = state.base_url();
  Ok(Json(records.into_iter().map(|md| MetaDataView::render(md, base)).collect()))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateBody {
  pub content_object:   Option<Value>,
  pub data_type:        Option<Value>,
  pub data_value:       Option<Value>,
  pub data_title:       Option<Value>,
  pub data_description: Option<Value>,
}

/// `POST /metadata`: creates the record for `(content_object, data_type)`,
/// or updates it in place if one already exists.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store + Clone + 'static,
{
  let body = input::json(body)?;
  let mut errors = FieldErrors::new();
  let owner = match errors.required_text(CONTENT_OBJECT, body.content_object.as_ref()) {
    Some(r) => {
      resolve_owner(&state, &state.metadata_refs, &caller, CONTENT_OBJECT, &r, &mut errors)
        .await?
    }
    None => None,
  };
  let data_type: Option<DataType> =
    errors.required_value_choice("data_type", body.data_type.as_ref());
  let data_value = errors.required_text("data_value", body.data_value.as_ref());
  let data_title = errors.text("data_title", body.data_title.as_ref());
  let data_description = errors.text("data_description", body.data_description.as_ref());

  let (Some(owner), Some(data_type), Some(data_value)) = (owner, data_type, data_value)
  else {
    return Err(errors.into());
  };
  if !errors.is_empty() {
    return Err(errors.into());
  }
  require(&state, &caller, owner.project_id, Need::Change).await?;

  let fields = MetaDataFields {
    data_type,
    data_value,
    data_title,
    data_description,
  };
  let upserted = state
    .store
    .upsert_metadata(owner, fields)
    .await
    .map_err(|e| ApiError::unique(e, UNIQUE_KEY))?;

  let status = if upserted.created { StatusCode::CREATED } else { StatusCode::OK };
  Ok((status, Json(MetaDataView::render(upserted.record, state.base_url()))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /metadata/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
) -> Result<Json<MetaDataView>, ApiError>
where
  S: Store + Clone + 'static,
{
  let md = load(&state, &caller, id, Need::View).await?;
  Ok(Json(MetaDataView::render(md, state.base_url())))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
  pub data_type:        Option<Value>,
  pub data_value:       Option<Value>,
  pub data_title:       Option<Value>,
  pub data_description: Option<Value>,
}

/// `PATCH /metadata/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
  body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<MetaDataView>, ApiError>
where
  S: Store + Clone + 'static,
{
  load(&state, &caller, id, Need::Change).await?;
  let body = input::json(body)?;

  let mut errors = FieldErrors::new();
  let data_type: Option<DataType> = errors.value_choice("data_type", body.data_type.as_ref());
  let data_value = body
    .data_value
    .as_ref()
    .and_then(|v| errors.present_text("data_value", v));
  let changes = MetaDataChanges {
    data_type,
    data_value,
    data_title: errors.text("data_title", body.data_title.as_ref()),
    data_description: errors.text("data_description", body.data_description.as_ref()),
  };
  let changes = errors.finish(changes)?;

  let md = state
    .store
    .update_metadata(id, changes)
    .await
    .map_err(|e| ApiError::unique(e, UNIQUE_KEY))?
    .ok_or(ApiError::NotFound)?;
  Ok(Json(MetaDataView::render(md, state.base_url())))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /metadata/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: Store + Clone + 'static,
{
  load(&state, &caller, id, Need::Change).await?;
  if !state
    .store
    .delete_metadata(id)
    .await
    .map_err(ApiError::store)?
  {
    return Err(ApiError::NotFound);
  }
  Ok(StatusCode::NO_CONTENT)
}
