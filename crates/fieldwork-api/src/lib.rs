//! JSON REST API for fieldwork.
//!
//! Exposes an axum [`Router`] under `/api/v1` backed by any
//! [`fieldwork_core::store::Store`]. Every route requires HTTP Basic auth;
//! the authenticated username is what role grants are checked against.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = fieldwork_api::router(AppState::new(store, config));
//! axum::serve(listener, app).await?;
//! ```

pub mod access;
pub mod auth;
pub mod dataviews;
pub mod error;
pub mod forms;
pub mod input;
pub mod links;
pub mod metadata;
pub mod projects;
pub mod widgets;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use fieldwork_core::{reference::ReferenceResolver, store::Store};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use auth::{AuthConfig, Caller};
pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FIELDWORK_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// Prefix for the absolute URLs rendered in responses, without `/api/v1`.
  pub base_url:   String,
  pub store_path: PathBuf,
  /// Username → argon2 PHC hash.
  #[serde(default)]
  pub users:      HashMap<String, String>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: Store> {
  pub store:         Arc<S>,
  pub config:        Arc<ServerConfig>,
  pub auth:          Arc<AuthConfig>,
  /// Owner kinds a widget may reference.
  pub widget_refs:   Arc<ReferenceResolver>,
  /// Owner kinds a metadata record may reference.
  pub metadata_refs: Arc<ReferenceResolver>,
}

impl<S: Store> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    let auth = AuthConfig { users: config.users.clone() };
    Self {
      store:         Arc::new(store),
      config:        Arc::new(config),
      auth:          Arc::new(auth),
      widget_refs:   Arc::new(ReferenceResolver::for_widgets()),
      metadata_refs: Arc::new(ReferenceResolver::for_metadata()),
    }
  }

  pub(crate) fn base_url(&self) -> &str { &self.config.base_url }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`, nested under `/api/v1`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: Store + Clone + 'static,
{
  let api = Router::new()
    // Directory
    .route("/projects", post(projects::create::<S>))
    .route("/projects/{id}", get(projects::get_one::<S>))
    .route("/projects/{id}/share", post(projects::share::<S>))
    .route("/forms", post(forms::create::<S>))
    .route("/forms/{id}", get(forms::get_one::<S>))
    .route("/dataviews", post(dataviews::create::<S>))
    .route("/dataviews/{id}", get(dataviews::get_one::<S>))
    // Widgets
    .route("/widgets", get(widgets::list::<S>).post(widgets::create::<S>))
    .route(
      "/widgets/{id}",
      get(widgets::get_one::<S>)
        .put(widgets::replace::<S>)
        .patch(widgets::update::<S>)
        .delete(widgets::remove::<S>),
    )
    // Metadata
    .route("/metadata", get(metadata::list::<S>).post(metadata::create::<S>))
    .route(
      "/metadata/{id}",
      get(metadata::get_one::<S>)
        .patch(metadata::update::<S>)
        .delete(metadata::remove::<S>),
    );

  Router::new()
    .nest("/api/v1", api)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
