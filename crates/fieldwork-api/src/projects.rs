//! Handlers for `/projects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/projects` | Body: `{"name":"..."}`; caller becomes owner |
//! | `GET`  | `/projects/{id}` | 404 if absent or not shared with the caller |
//! | `POST` | `/projects/{id}/share` | Body: `{"username":"...","role":"editor"}` |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use fieldwork_core::{
  owner::Project,
  permission::{Need, Role},
  store::Store,
  validation::FieldErrors,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{AppState, access::require, auth::Caller, error::ApiError, input, links};

#[derive(Debug, Serialize)]
pub struct ProjectView {
  pub id:         i64,
  pub url:        String,
  pub name:       String,
  pub created_by: String,
  pub created_at: DateTime<Utc>,
}

impl ProjectView {
  fn render(project: Project, base: &str) -> Self {
    Self {
      id:         project.id,
      url:        links::api_url(base, "projects", project.id),
      name:       project.name,
      created_by: project.created_by,
      created_at: project.created_at,
    }
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: Option<Value>,
}

/// `POST /projects`
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
  let Some(name) = errors.required_text("name", body.name.as_ref()) else {
    return Err(errors.into());
  };

  let project = state
    .store
    .create_project(name, caller.username)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(ProjectView::render(project, state.base_url()))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /projects/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
) -> Result<Json<ProjectView>, ApiError>
where
  S: Store + Clone + 'static,
{
  let project = state
    .store
    .get_project(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::NotFound)?;
  require(&state, &caller, project.id, Need::View).await?;
  Ok(Json(ProjectView::render(project, state.base_url())))
}

// ─── Share ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ShareBody {
  pub username: Option<Value>,
  pub role:     Option<Value>,
}

/// `POST /projects/{id}/share`: grant (or replace) a user's role.
pub async fn share<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<i64>,
  body: Result<Json<ShareBody>, JsonRejection>,
) -> Result<StatusCode, ApiError>
where
  S: Store + Clone + 'static,
{
  state
    .store
    .get_project(id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::NotFound)?;
  require(&state, &caller, id, Need::Share).await?;

  let body = input::json(body)?;
  let mut errors = FieldErrors::new();
  let username = errors.required_text("username", body.username.as_ref());
  let role: Option<Role> = errors.required_value_choice("role", body.role.as_ref());
  let (Some(username), Some(role)) = (username, role) else {
    return Err(errors.into());
  };

  state
    .store
    .assign_role(id, username.clone(), role)
    .await
    .map_err(ApiError::store)?;
  info!(project_id = id, %username, %role, granted_by = %caller.username, "project shared");
  Ok(StatusCode::NO_CONTENT)
}
