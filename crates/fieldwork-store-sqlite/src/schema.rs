//! SQL schema for the fieldwork SQLite store.
//!
//! Executed once per connection at startup. Future migrations will be gated
//! on `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Ids use `AUTOINCREMENT` so a deleted record's id is never handed out
/// again.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS projects (
    project_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    created_by  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS forms (
    form_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id  INTEGER NOT NULL REFERENCES projects(project_id),
    title       TEXT NOT NULL,
    id_string   TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (project_id, id_string)
);

CREATE TABLE IF NOT EXISTS dataviews (
    dataview_id INTEGER PRIMARY KEY AUTOINCREMENT,
    form_id     INTEGER NOT NULL REFERENCES forms(form_id),
    project_id  INTEGER NOT NULL REFERENCES projects(project_id),
    name        TEXT NOT NULL,
    columns     TEXT NOT NULL DEFAULT '[]',   -- JSON array of column names
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS role_grants (
    project_id  INTEGER NOT NULL REFERENCES projects(project_id),
    username    TEXT NOT NULL,
    role        TEXT NOT NULL,   -- 'readonly' | 'dataentry' | 'editor' | 'manager' | 'owner'
    PRIMARY KEY (project_id, username)
);

-- Owners are polymorphic (owner_kind, owner_id); project_id is denormalised
-- from the owner so visibility filtering is a single join on role_grants.
CREATE TABLE IF NOT EXISTS metadata (
    metadata_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_kind       TEXT NOT NULL,   -- 'form' | 'dataview' | 'project'
    owner_id         INTEGER NOT NULL,
    project_id       INTEGER NOT NULL REFERENCES projects(project_id),
    data_type        TEXT NOT NULL,
    data_value       TEXT NOT NULL,
    data_title       TEXT,
    data_description TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    UNIQUE (owner_kind, owner_id, data_type)
);

CREATE TABLE IF NOT EXISTS widgets (
    widget_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    widget_key    TEXT NOT NULL UNIQUE,
    owner_kind    TEXT NOT NULL,   -- 'form' | 'dataview'
    owner_id      INTEGER NOT NULL,
    project_id    INTEGER NOT NULL REFERENCES projects(project_id),
    widget_type   TEXT NOT NULL,
    view_type     TEXT NOT NULL,
    column_name   TEXT NOT NULL,
    group_by      TEXT,
    aggregation   TEXT,
    title         TEXT,
    description   TEXT,
    display_order INTEGER NOT NULL,
    metadata      TEXT NOT NULL DEFAULT '{}',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS metadata_project_idx ON metadata(project_id);
CREATE INDEX IF NOT EXISTS widgets_owner_idx    ON widgets(owner_kind, owner_id);
CREATE INDEX IF NOT EXISTS widgets_project_idx  ON widgets(project_id);
CREATE INDEX IF NOT EXISTS grants_user_idx      ON role_grants(username);

PRAGMA user_version = 1;
";
