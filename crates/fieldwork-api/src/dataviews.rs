//! Handlers for `/dataviews` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/dataviews` | Body: `{"xform":"<form url>","name":"...","columns":[...]}` |
//! | `GET`  | `/dataviews/{id}` | 404 if absent or hidden |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use fieldwork_core::{
  owner::{DataView, NewDataView, OwnerKind},
  permission::Need,
  reference::ReferenceResolver,
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

#[derive(Debug, Serialize)]
pub struct DataViewView {
  pub id:         i64,
  pub url:        String,
  pub xform:      String,
  pub project:    String,
  pub name:       String,
  pub columns:    Vec<String>,
  pub created_at: DateTime<Utc>,
}

impl DataViewView {
  fn render(dv: DataView, base: &str) -> Self {
    Self {
      id:         dv.id,
      url:        links::api_url(base, "dataviews", dv.id),
      xform:      links::api_url(base, "forms", dv.form_id),
      project:    links::api_url(base, "projects", dv.project_id),
      name:       dv.name,
      columns:    dv.columns,
      created_at: dv.created_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub xform:   Option<Value>,
  pub name:    Option<Value>,
  #[serde(default)]
  pub columns: Vec<String>,
}

/// `POST /dataviews`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store + Clone + 'static,
{
  let body = input::json(body)?;
  let forms = ReferenceResolver::new().register(OwnerKind::Form);

  let mut errors = FieldErrors::new();
  let form = match errors.required_text("xform", body.xform.as_ref()) {
    Some(r) => resolve_owner(&state, &forms, &caller, "xform", &r, &mut errors).await?,
    None => None,
  };
  let name = errors.required_text("name", body.name.as_ref());

  let (Some(form), Some(name)) = (form, name) else {
    return Err(errors.into());
  };
  require(&state, &caller, form.project_id, Need::Change).await?;

  let dataview = state
    .store
    .create_dataview(NewDataView { form_id: form.id, name, columns: body.columns })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(DataViewView::render(dataview, state.base_url()))))
}

/// `GET /dataviews/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
) -> Result<Json<DataViewView>, ApiError>
where
  S: Store + Clone + 'static,
{
  let dataview = state
    .store
    .get_dataview(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::NotFound)?;
  require(&state, &caller, dataview.project_id, Need::View).await?;
  Ok(Json(DataViewView::render(dataview, state.base_url())))
}
