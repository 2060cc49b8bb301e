//! The `Store` trait.
//!
//! Implemented by storage backends (e.g. `fieldwork-store-sqlite`). The HTTP
//! layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  metadata::{DataType, MetaData, MetaDataChanges, MetaDataFields, MetaDataQuery, Upserted},
  owner::{DataView, Form, NewDataView, NewForm, Owner, OwnerKind, Project},
  permission::Role,
  widget::{NewWidget, Widget, WidgetChanges, WidgetQuery},
};

/// Implemented by backend error types so callers can tell a uniqueness
/// collision (a client problem) apart from an actual storage failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The write was rejected because it would duplicate a unique key.
  fn is_conflict(&self) -> bool;
}

/// Abstraction over a fieldwork store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait Store: Send + Sync {
  type Error: StoreError;

  // ── Directory ─────────────────────────────────────────────────────────

  /// Create a project and grant `created_by` the owner role on it.
  fn create_project(
    &self,
    name: String,
    created_by: String,
  ) -> impl Future<Output = Result<Project, Self::Error>> + Send + '_;

  fn get_project(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Project>, Self::Error>> + Send + '_;

  /// Returns an error if the project does not exist or `id_string` is
  /// already used in it.
  fn create_form(
    &self,
    input: NewForm,
  ) -> impl Future<Output = Result<Form, Self::Error>> + Send + '_;

  fn get_form(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Form>, Self::Error>> + Send + '_;

  /// Returns an error if the form does not exist.
  fn create_dataview(
    &self,
    input: NewDataView,
  ) -> impl Future<Output = Result<DataView, Self::Error>> + Send + '_;

  fn get_dataview(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<DataView>, Self::Error>> + Send + '_;

  /// Fetch the owner handle for `(kind, id)`, or `None` if no such entity.
  fn lookup_owner(
    &self,
    kind: OwnerKind,
    id: i64,
  ) -> impl Future<Output = Result<Option<Owner>, Self::Error>> + Send + '_;

  // ── Role grants ───────────────────────────────────────────────────────

  /// Grant `role` to `username` on a project, replacing any previous role.
  fn assign_role(
    &self,
    project_id: i64,
    username: String,
    role: Role,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn role_for(
    &self,
    project_id: i64,
    username: String,
  ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send + '_;

  // ── Metadata ──────────────────────────────────────────────────────────

  /// Create the `(owner, fields.data_type)` record, or update it in place if
  /// it already exists. Atomic: racing calls on the same key never produce
  /// two records.
  fn upsert_metadata(
    &self,
    owner: Owner,
    fields: MetaDataFields,
  ) -> impl Future<Output = Result<Upserted<MetaData>, Self::Error>> + Send + '_;

  fn get_metadata(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<MetaData>, Self::Error>> + Send + '_;

  /// Exact lookup by `(owner, data_type)`.
  fn find_metadata(
    &self,
    owner: Owner,
    data_type: DataType,
  ) -> impl Future<Output = Result<Option<MetaData>, Self::Error>> + Send + '_;

  fn list_metadata<'a>(
    &'a self,
    query: &'a MetaDataQuery,
  ) -> impl Future<Output = Result<Vec<MetaData>, Self::Error>> + Send + 'a;

  /// Merge `changes` into the record with primary key `id`. Returns `None`
  /// if there is no such record, and a conflict error if the new
  /// `data_type` is already used by the same owner.
  fn update_metadata(
    &self,
    id: i64,
    changes: MetaDataChanges,
  ) -> impl Future<Output = Result<Option<MetaData>, Self::Error>> + Send + '_;

  /// Delete exactly the record with primary key `id`. Returns whether a
  /// record was removed.
  fn delete_metadata(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Widgets ───────────────────────────────────────────────────────────

  /// Persist a new widget, appended after the owner's existing widgets.
  fn create_widget(
    &self,
    input: NewWidget,
  ) -> impl Future<Output = Result<Widget, Self::Error>> + Send + '_;

  fn get_widget(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Widget>, Self::Error>> + Send + '_;

  fn list_widgets<'a>(
    &'a self,
    query: &'a WidgetQuery,
  ) -> impl Future<Output = Result<Vec<Widget>, Self::Error>> + Send + 'a;

  fn update_widget(
    &self,
    id: i64,
    changes: WidgetChanges,
  ) -> impl Future<Output = Result<Option<Widget>, Self::Error>> + Send + '_;

  fn delete_widget(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
