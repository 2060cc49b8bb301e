//! [`SqliteStore`], the SQLite implementation of [`Store`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use fieldwork_core::{
  metadata::{DataType, MetaData, MetaDataChanges, MetaDataFields, MetaDataQuery, Upserted},
  owner::{DataView, Form, NewDataView, NewForm, Owner, OwnerKind, Project},
  permission::Role,
  store::Store,
  widget::{NewWidget, Widget, WidgetChanges, WidgetQuery},
};

use crate::{
  encode::{
    DATAVIEW_COLUMNS, FORM_COLUMNS, METADATA_COLUMNS, PROJECT_COLUMNS, RawDataView,
    RawForm, RawMetaData, RawProject, RawWidget, WIDGET_COLUMNS, decode_enum,
    encode_columns, encode_dt, encode_json,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Position after the last widget of owner `(?1, ?2)`.
const NEXT_WIDGET_ORDER: &str = "SELECT COALESCE(MAX(display_order) + 1, 0) FROM widgets
   WHERE owner_kind = ?1 AND owner_id = ?2";

fn select_metadata(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawMetaData>> {
  conn
    .query_row(
      &format!("SELECT {METADATA_COLUMNS} FROM metadata WHERE metadata_id = ?1"),
      rusqlite::params![id],
      RawMetaData::from_row,
    )
    .optional()
}

fn select_widget(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawWidget>> {
  conn
    .query_row(
      &format!("SELECT {WIDGET_COLUMNS} FROM widgets WHERE widget_id = ?1"),
      rusqlite::params![id],
      RawWidget::from_row,
    )
    .optional()
}

/// Split an optional owner filter into its bindable column values.
fn owner_filter(owner: Option<(OwnerKind, i64)>) -> (Option<String>, Option<i64>) {
  match owner {
    Some((kind, id)) => (Some(kind.as_ref().to_owned()), Some(id)),
    None => (None, None),
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A fieldwork store backed by a single SQLite file.
///
/// Clones share one reference-counted connection. Separate
/// `SqliteStore`s (or processes) may open the same file; uniqueness holds
/// across them because upserts run in `IMMEDIATE` transactions against a
/// `UNIQUE` index.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Store impl ──────────────────────────────────────────────────────────────

impl Store for SqliteStore {
  type Error = Error;

  // ── Directory ─────────────────────────────────────────────────────────────

  async fn create_project(&self, name: String, created_by: String) -> Result<Project> {
    let created_at = encode_dt(Utc::now());
    let owner_role = Role::Owner.as_ref().to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO projects (name, created_by, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![name, created_by, created_at],
        )?;
        let project_id = tx.last_insert_rowid();
        tx.execute(
          "INSERT INTO role_grants (project_id, username, role) VALUES (?1, ?2, ?3)",
          rusqlite::params![project_id, created_by, owner_role],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1"),
          rusqlite::params![project_id],
          RawProject::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    debug!(project_id = raw.project_id, "project created");
    raw.into_project()
  }

  async fn get_project(&self, id: i64) -> Result<Option<Project>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1"),
              rusqlite::params![id],
              RawProject::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProject::into_project).transpose()
  }

  async fn create_form(&self, input: NewForm) -> Result<Form> {
    let project_id = input.project_id;
    let created_at = encode_dt(Utc::now());

    let raw: Option<RawForm> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM projects WHERE project_id = ?1",
            rusqlite::params![project_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO forms (project_id, title, id_string, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![project_id, input.title, input.id_string, created_at],
        )?;
        let form_id = tx.last_insert_rowid();
        let raw = tx.query_row(
          &format!("SELECT {FORM_COLUMNS} FROM forms WHERE form_id = ?1"),
          rusqlite::params![form_id],
          RawForm::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await
      .map_err(Error::from_write)?;

    let form = raw.ok_or(Error::ProjectNotFound(project_id))?.into_form()?;
    debug!(form_id = form.id, project_id, "form created");
    Ok(form)
  }

  async fn get_form(&self, id: i64) -> Result<Option<Form>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {FORM_COLUMNS} FROM forms WHERE form_id = ?1"),
              rusqlite::params![id],
              RawForm::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawForm::into_form).transpose()
  }

  async fn create_dataview(&self, input: NewDataView) -> Result<DataView> {
    let form_id = input.form_id;
    let columns = encode_columns(&input.columns)?;
    let created_at = encode_dt(Utc::now());

    let raw: Option<RawDataView> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let project_id: Option<i64> = tx
          .query_row(
            "SELECT project_id FROM forms WHERE form_id = ?1",
            rusqlite::params![form_id],
            |r| r.get(0),
          )
          .optional()?;
        let Some(project_id) = project_id else {
          return Ok(None);
        };

        tx.execute(
          "INSERT INTO dataviews (form_id, project_id, name, columns, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![form_id, project_id, input.name, columns, created_at],
        )?;
        let dataview_id = tx.last_insert_rowid();
        let raw = tx.query_row(
          &format!("SELECT {DATAVIEW_COLUMNS} FROM dataviews WHERE dataview_id = ?1"),
          rusqlite::params![dataview_id],
          RawDataView::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    let dataview = raw.ok_or(Error::FormNotFound(form_id))?.into_dataview()?;
    debug!(dataview_id = dataview.id, form_id, "dataview created");
    Ok(dataview)
  }

  async fn get_dataview(&self, id: i64) -> Result<Option<DataView>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DATAVIEW_COLUMNS} FROM dataviews WHERE dataview_id = ?1"),
              rusqlite::params![id],
              RawDataView::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDataView::into_dataview).transpose()
  }

  async fn lookup_owner(&self, kind: OwnerKind, id: i64) -> Result<Option<Owner>> {
    let sql = match kind {
      OwnerKind::Form => "SELECT form_id, project_id FROM forms WHERE form_id = ?1",
      OwnerKind::DataView => {
        "SELECT dataview_id, project_id FROM dataviews WHERE dataview_id = ?1"
      }
      OwnerKind::Project => {
        "SELECT project_id, project_id FROM projects WHERE project_id = ?1"
      }
    };

    let found: Option<(i64, i64)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![id], |r| Ok((r.get(0)?, r.get(1)?)))
            .optional()?,
        )
      })
      .await?;

    Ok(found.map(|(id, project_id)| Owner { kind, id, project_id }))
  }

  // ── Role grants ───────────────────────────────────────────────────────────

  async fn assign_role(&self, project_id: i64, username: String, role: Role) -> Result<()> {
    let role_str = role.as_ref().to_owned();
    debug!(project_id, %username, %role, "assigning role");

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO role_grants (project_id, username, role) VALUES (?1, ?2, ?3)
           ON CONFLICT (project_id, username) DO UPDATE SET role = excluded.role",
          rusqlite::params![project_id, username, role_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn role_for(&self, project_id: i64, username: String) -> Result<Option<Role>> {
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT role FROM role_grants WHERE project_id = ?1 AND username = ?2",
              rusqlite::params![project_id, username],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(|s| decode_enum("role", &s)).transpose()
  }

  // ── Metadata ──────────────────────────────────────────────────────────────

  async fn upsert_metadata(
    &self,
    owner: Owner,
    fields: MetaDataFields,
  ) -> Result<Upserted<MetaData>> {
    let owner_kind = owner.kind.as_ref().to_owned();
    let data_type = fields.data_type.as_ref().to_owned();
    let now = encode_dt(Utc::now());

    // Insert first; if the unique key already exists nothing is inserted and
    // the existing row is updated instead. The IMMEDIATE transaction takes
    // the write lock up front so the insert/update/reselect sequence cannot
    // interleave with another writer.
    let (raw, created): (RawMetaData, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
          "INSERT INTO metadata (
             owner_kind, owner_id, project_id, data_type, data_value,
             data_title, data_description, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
           ON CONFLICT (owner_kind, owner_id, data_type) DO NOTHING",
          rusqlite::params![
            owner_kind,
            owner.id,
            owner.project_id,
            data_type,
            fields.data_value,
            fields.data_title,
            fields.data_description,
            now,
          ],
        )?;

        if inserted == 0 {
          tx.execute(
            "UPDATE metadata
             SET data_value       = ?4,
                 data_title       = COALESCE(?5, data_title),
                 data_description = COALESCE(?6, data_description),
                 updated_at       = ?7
             WHERE owner_kind = ?1 AND owner_id = ?2 AND data_type = ?3",
            rusqlite::params![
              owner_kind,
              owner.id,
              data_type,
              fields.data_value,
              fields.data_title,
              fields.data_description,
              now,
            ],
          )?;
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {METADATA_COLUMNS} FROM metadata
             WHERE owner_kind = ?1 AND owner_id = ?2 AND data_type = ?3"
          ),
          rusqlite::params![owner_kind, owner.id, data_type],
          RawMetaData::from_row,
        )?;
        tx.commit()?;
        Ok((raw, inserted == 1))
      })
      .await?;

    let record = raw.into_metadata()?;
    info!(
      metadata_id = record.id,
      owner_kind = %owner.kind,
      owner_id = owner.id,
      data_type = %record.data_type,
      created,
      "metadata upserted"
    );
    Ok(Upserted { record, created })
  }

  async fn get_metadata(&self, id: i64) -> Result<Option<MetaData>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_metadata(conn, id)?))
      .await?;
    raw.map(RawMetaData::into_metadata).transpose()
  }

  async fn find_metadata(&self, owner: Owner, data_type: DataType) -> Result<Option<MetaData>> {
    let owner_kind = owner.kind.as_ref().to_owned();
    let data_type = data_type.as_ref().to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {METADATA_COLUMNS} FROM metadata
                 WHERE owner_kind = ?1 AND owner_id = ?2 AND data_type = ?3"
              ),
              rusqlite::params![owner_kind, owner.id, data_type],
              RawMetaData::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMetaData::into_metadata).transpose()
  }

  async fn list_metadata(&self, query: &MetaDataQuery) -> Result<Vec<MetaData>> {
    let (owner_kind, owner_id) = owner_filter(query.owner);
    let data_type = query.data_type.map(|t| t.as_ref().to_owned());
    let visible_to = query.visible_to.clone();

    let raws: Vec<RawMetaData> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {METADATA_COLUMNS} FROM metadata
           WHERE (?1 IS NULL OR (owner_kind = ?1 AND owner_id = ?2))
             AND (?3 IS NULL OR data_type = ?3)
             AND (?4 IS NULL OR project_id IN (
                   SELECT project_id FROM role_grants WHERE username = ?4))
           ORDER BY metadata_id"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![owner_kind, owner_id, data_type, visible_to],
            RawMetaData::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMetaData::into_metadata).collect()
  }

  async fn update_metadata(&self, id: i64, changes: MetaDataChanges) -> Result<Option<MetaData>> {
    let data_type = changes.data_type.map(|t| t.as_ref().to_owned());
    let now = encode_dt(Utc::now());

    let raw: Option<RawMetaData> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE metadata
           SET data_type        = COALESCE(?2, data_type),
               data_value       = COALESCE(?3, data_value),
               data_title       = COALESCE(?4, data_title),
               data_description = COALESCE(?5, data_description),
               updated_at       = ?6
           WHERE metadata_id = ?1",
          rusqlite::params![
            id,
            data_type,
            changes.data_value,
            changes.data_title,
            changes.data_description,
            now,
          ],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        let raw = select_metadata(&tx, id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await
      .map_err(Error::from_write)?;

    debug!(metadata_id = id, found = raw.is_some(), "metadata updated");
    raw.map(RawMetaData::into_metadata).transpose()
  }

  async fn delete_metadata(&self, id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM metadata WHERE metadata_id = ?1", rusqlite::params![id])?)
      })
      .await?;
    debug!(metadata_id = id, removed, "metadata deleted");
    Ok(removed > 0)
  }

  // ── Widgets ───────────────────────────────────────────────────────────────

  async fn create_widget(&self, input: NewWidget) -> Result<Widget> {
    let key = Uuid::new_v4().simple().to_string();
    let owner = input.owner;
    let owner_kind = owner.kind.as_ref().to_owned();
    let widget_type = input.widget_type.as_ref().to_owned();
    let view_type = input.view_type.as_ref().to_owned();
    let metadata = encode_json(&input.metadata);
    let now = encode_dt(Utc::now());

    let raw: RawWidget = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let order: i64 =
          tx.query_row(NEXT_WIDGET_ORDER, rusqlite::params![owner_kind, owner.id], |r| r.get(0))?;
        tx.execute(
          "INSERT INTO widgets (
             widget_key, owner_kind, owner_id, project_id, widget_type,
             view_type, column_name, group_by, aggregation, title,
             description, display_order, metadata, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
          rusqlite::params![
            key,
            owner_kind,
            owner.id,
            owner.project_id,
            widget_type,
            view_type,
            input.column,
            input.group_by,
            input.aggregation,
            input.title,
            input.description,
            order,
            metadata,
            now,
          ],
        )?;
        let widget_id = tx.last_insert_rowid();
        let raw = tx.query_row(
          &format!("SELECT {WIDGET_COLUMNS} FROM widgets WHERE widget_id = ?1"),
          rusqlite::params![widget_id],
          RawWidget::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await
      .map_err(Error::from_write)?;

    let widget = raw.into_widget()?;
    info!(
      widget_id = widget.id,
      owner_kind = %owner.kind,
      owner_id = owner.id,
      "widget created"
    );
    Ok(widget)
  }

  async fn get_widget(&self, id: i64) -> Result<Option<Widget>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_widget(conn, id)?))
      .await?;
    raw.map(RawWidget::into_widget).transpose()
  }

  async fn list_widgets(&self, query: &WidgetQuery) -> Result<Vec<Widget>> {
    let (owner_kind, owner_id) = owner_filter(query.owner);
    let visible_to = query.visible_to.clone();

    let raws: Vec<RawWidget> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {WIDGET_COLUMNS} FROM widgets
           WHERE (?1 IS NULL OR (owner_kind = ?1 AND owner_id = ?2))
             AND (?3 IS NULL OR project_id IN (
                   SELECT project_id FROM role_grants WHERE username = ?3))
           ORDER BY widget_id"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![owner_kind, owner_id, visible_to],
            RawWidget::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawWidget::into_widget).collect()
  }

  async fn update_widget(&self, id: i64, changes: WidgetChanges) -> Result<Option<Widget>> {
    let owner_kind = changes.owner.map(|o| o.kind.as_ref().to_owned());
    let owner_id = changes.owner.map(|o| o.id);
    let project_id = changes.owner.map(|o| o.project_id);
    let widget_type = changes.widget_type.map(|t| t.as_ref().to_owned());
    let view_type = changes.view_type.map(|t| t.as_ref().to_owned());
    let metadata = changes.metadata.as_ref().map(encode_json);
    let now = encode_dt(Utc::now());

    let raw: Option<RawWidget> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<(String, i64)> = tx
          .query_row(
            "SELECT owner_kind, owner_id FROM widgets WHERE widget_id = ?1",
            rusqlite::params![id],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((current_kind, current_id)) = current else {
          return Ok(None);
        };

        // A widget moved to another owner goes to the end of that owner's list.
        let order: Option<i64> = match (&owner_kind, owner_id) {
          (Some(kind), Some(oid)) if *kind != current_kind || oid != current_id => {
            Some(tx.query_row(NEXT_WIDGET_ORDER, rusqlite::params![kind, oid], |r| r.get(0))?)
          }
          _ => None,
        };

        let updated = tx.execute(
          "UPDATE widgets
           SET owner_kind  = COALESCE(?2, owner_kind),
               owner_id    = COALESCE(?3, owner_id),
               project_id  = COALESCE(?4, project_id),
               widget_type = COALESCE(?5, widget_type),
               view_type   = COALESCE(?6, view_type),
               column_name = COALESCE(?7, column_name),
               group_by    = COALESCE(?8, group_by),
               aggregation = COALESCE(?9, aggregation),
               title       = COALESCE(?10, title),
               description = COALESCE(?11, description),
               metadata    = COALESCE(?12, metadata),
               updated_at  = ?13,
               display_order = COALESCE(?14, display_order)
           WHERE widget_id = ?1",
          rusqlite::params![
            id,
            owner_kind,
            owner_id,
            project_id,
            widget_type,
            view_type,
            changes.column,
            changes.group_by,
            changes.aggregation,
            changes.title,
            changes.description,
            metadata,
            now,
            order,
          ],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        let raw = select_widget(&tx, id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    debug!(widget_id = id, found = raw.is_some(), "widget updated");
    raw.map(RawWidget::into_widget).transpose()
  }

  async fn delete_widget(&self, id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM widgets WHERE widget_id = ?1", rusqlite::params![id])?)
      })
      .await?;
    debug!(widget_id = id, removed, "widget deleted");
    Ok(removed > 0)
  }
}
