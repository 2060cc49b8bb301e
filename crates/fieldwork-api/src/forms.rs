//! Handlers for `/forms` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/forms` | Body: `{"project":"<project url>","title":"...","id_string":"..."}` |
//! | `GET`  | `/forms/{id}` | 404 if absent or hidden |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use fieldwork_core::{
  owner::{Form, NewForm, OwnerKind},
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
pub struct FormView {
  pub id:         i64,
  pub url:        String,
  pub project:    String,
  pub title:      String,
  pub id_string:  String,
  pub created_at: DateTime<Utc>,
}

impl FormView {
  fn render(form: Form, base: &str) -> Self {
    Self {
      id:         form.id,
      url:        links::api_url(base, "forms", form.id),
      project:    links::api_url(base, "projects", form.project_id),
      title:      form.title,
      id_string:  form.id_string,
      created_at: form.created_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub project:   Option<Value>,
  pub title:     Option<Value>,
  pub id_string: Option<Value>,
}

/// `POST /forms`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Store + Clone + 'static,
{
  let body = input::json(body)?;
  let projects = ReferenceResolver::new().register(OwnerKind::Project);

  let mut errors = FieldErrors::new();
  let project = match errors.required_text("project", body.project.as_ref()) {
    Some(r) => resolve_owner(&state, &projects, &caller, "project", &r, &mut errors).await?,
    None => None,
  };
  let title = errors.required_text("title", body.title.as_ref());
  let id_string = errors.required_text("id_string", body.id_string.as_ref());

  let (Some(project), Some(title), Some(id_string)) = (project, title, id_string) else {
    return Err(errors.into());
  };
  require(&state, &caller, project.id, Need::Change).await?;

  let form = state
    .store
    .create_form(NewForm { project_id: project.id, title, id_string })
    .await
    .map_err(|e| ApiError::unique(e, "project, id_string"))?;
  Ok((StatusCode::CREATED, Json(FormView::render(form, state.base_url()))))
}

/// `GET /forms/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
) -> Result<Json<FormView>, ApiError>
where
  S: Store + Clone + 'static,
{
  let form = state
    .store
    .get_form(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::NotFound)?;
  require(&state, &caller, form.project_id, Need::View).await?;
  Ok(Json(FormView::render(form, state.base_url())))
}
