//! Schema creation and in-place migrations.
//!
//! Runs on every open. Base tables are created with `IF NOT EXISTS`; each
//! migration then inspects the live schema to decide whether it still needs
//! to run, so there is no version counter to keep in sync.
//!
//! A migration that fails is logged and recorded in the [`MigrationReport`]
//! but does not stop the store from opening.

use dialedger_core::entry::EntryType;
use rusqlite::{Connection, OptionalExtension as _};
use serde::Serialize;
use tracing::{error, info};

use crate::encode::ENTRY_COLUMNS;

// ─── DDL ─────────────────────────────────────────────────────────────────────

const THREADS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS threads (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT,
    created_at  DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at  DATETIME DEFAULT CURRENT_TIMESTAMP
);
";

const ATTACHMENTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS attachments (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id   INTEGER NOT NULL,
    file_name  TEXT NOT NULL,
    file_path  TEXT NOT NULL,   -- managed copy, never the upload temp file
    file_size  INTEGER,
    mime_type  TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE
);
";

const ENTRY_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_entries_thread_id  ON entries(thread_id);
CREATE INDEX IF NOT EXISTS idx_entries_entry_date ON entries(entry_date);
";

const ATTACHMENT_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_attachments_entry_id ON attachments(entry_id);
";

/// `'note', 'meeting', ...` for the `entry_type` CHECK constraint.
fn entry_type_list() -> String {
  EntryType::ALL
    .iter()
    .map(|t| format!("'{t}'"))
    .collect::<Vec<_>>()
    .join(", ")
}

/// DDL for the entries table under `name`. The rebuild migration creates the
/// replacement under a temporary name with the same definition.
fn entries_table_sql(name: &str, if_not_exists: bool) -> String {
  let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
  format!(
    "CREATE TABLE {guard}{name} (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id  INTEGER NOT NULL,
    entry_type TEXT NOT NULL CHECK(entry_type IN ({types})),
    title      TEXT,
    content    TEXT,
    entry_date DATETIME NOT NULL,   -- caller-supplied, never defaulted
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    metadata   TEXT,                -- JSON payload, shape depends on entry_type
    FOREIGN KEY (thread_id) REFERENCES threads(id) ON DELETE CASCADE
);",
    types = entry_type_list(),
  )
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum MigrationOutcome {
  /// The live schema already had the change; nothing ran.
  AlreadyApplied,
  Applied,
  /// The step was rolled back; the schema is as it was before the step.
  Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
  pub name:    &'static str,
  pub outcome: MigrationOutcome,
}

/// What happened to each migration during the most recent open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
  pub steps: Vec<MigrationStep>,
}

impl MigrationReport {
  pub fn failures(&self) -> impl Iterator<Item = &MigrationStep> {
    self
      .steps
      .iter()
      .filter(|s| matches!(s.outcome, MigrationOutcome::Failed(_)))
  }

  pub fn is_clean(&self) -> bool { self.failures().next().is_none() }

  pub fn outcome(&self, name: &str) -> Option<&MigrationOutcome> {
    self.steps.iter().find(|s| s.name == name).map(|s| &s.outcome)
  }
}

// ─── Migrations ──────────────────────────────────────────────────────────────

pub const THREAD_DISPLAY_ORDER: &str = "threads_display_order";
pub const ENTRY_TYPE_CONSTRAINT: &str = "entries_entry_type_constraint";

type Migration = fn(&mut Connection) -> rusqlite::Result<bool>;

/// In application order. Each returns `Ok(false)` when the schema was already
/// up to date.
const MIGRATIONS: &[(&str, Migration)] = &[
  (THREAD_DISPLAY_ORDER, add_thread_display_order),
  (ENTRY_TYPE_CONSTRAINT, widen_entry_type_constraint),
];

/// Create the base schema, then apply every migration. Only a failure to
/// create the base tables is returned as an error.
pub fn initialize(conn: &mut Connection) -> rusqlite::Result<MigrationReport> {
  conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
  conn.pragma_update(None, "foreign_keys", "ON")?;

  conn.execute_batch(THREADS_TABLE)?;
  conn.execute_batch(&entries_table_sql("entries", true))?;
  conn.execute_batch(ATTACHMENTS_TABLE)?;
  conn.execute_batch(ENTRY_INDEXES)?;
  conn.execute_batch(ATTACHMENT_INDEXES)?;

  let mut report = MigrationReport::default();
  for &(name, migrate) in MIGRATIONS {
    let outcome = match migrate(conn) {
      Ok(true) => {
        info!(migration = name, "applied schema migration");
        MigrationOutcome::Applied
      }
      Ok(false) => MigrationOutcome::AlreadyApplied,
      Err(e) => {
        error!(migration = name, error = %e, "schema migration failed");
        MigrationOutcome::Failed(e.to_string())
      }
    };
    report.steps.push(MigrationStep { name, outcome });
  }
  Ok(report)
}

pub fn column_exists(
  conn: &Connection,
  table: &str,
  column: &str,
) -> rusqlite::Result<bool> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
  let mut rows = stmt.query([])?;
  while let Some(row) = rows.next()? {
    let name: String = row.get(1)?;
    if name == column {
      return Ok(true);
    }
  }
  Ok(false)
}

/// The stored `CREATE TABLE` text for `table`, if it exists.
pub fn table_sql(conn: &Connection, table: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
      [table],
      |r| r.get(0),
    )
    .optional()
}

/// Threads gained a manual sort key after the first release. Existing rows
/// are ordered by id.
fn add_thread_display_order(conn: &mut Connection) -> rusqlite::Result<bool> {
  if column_exists(conn, "threads", "display_order")? {
    return Ok(false);
  }
  let tx = conn.transaction()?;
  tx.execute_batch(
    "ALTER TABLE threads ADD COLUMN display_order INTEGER DEFAULT 0;
     UPDATE threads SET display_order = id WHERE display_order = 0;",
  )?;
  tx.commit()?;
  Ok(true)
}

/// SQLite cannot alter a CHECK constraint, so an entries table whose
/// constraint is missing any current entry type is rebuilt: create a
/// replacement, copy every row, drop the original, rename, and recreate the
/// indexes that existed on it.
fn widen_entry_type_constraint(conn: &mut Connection) -> rusqlite::Result<bool> {
  let Some(sql) = table_sql(conn, "entries")? else {
    return Ok(false);
  };
  if EntryType::ALL
    .iter()
    .all(|t| sql.contains(&format!("'{t}'")))
  {
    return Ok(false);
  }

  // Off so dropping the old table does not cascade into attachments. The
  // pragma is ignored inside a transaction.
  conn.pragma_update(None, "foreign_keys", "OFF")?;
  let result = rebuild_entries(conn);
  conn.pragma_update(None, "foreign_keys", "ON")?;
  result.map(|()| true)
}

fn rebuild_entries(conn: &mut Connection) -> rusqlite::Result<()> {
  let tx = conn.transaction()?;

  let saved_indexes: Vec<String> = {
    let mut stmt = tx.prepare(
      "SELECT sql FROM sqlite_master
       WHERE type = 'index' AND tbl_name = 'entries' AND sql IS NOT NULL",
    )?;
    stmt
      .query_map([], |r| r.get(0))?
      .collect::<rusqlite::Result<_>>()?
  };

  tx.execute_batch("DROP TABLE IF EXISTS entries_new;")?;
  tx.execute_batch(&entries_table_sql("entries_new", false))?;
  tx.execute(
    &format!(
      "INSERT INTO entries_new ({ENTRY_COLUMNS}) SELECT {ENTRY_COLUMNS} FROM entries"
    ),
    [],
  )?;
  tx.execute_batch(
    "DROP TABLE entries;
     ALTER TABLE entries_new RENAME TO entries;",
  )?;
  for index in &saved_indexes {
    tx.execute_batch(index)?;
  }
  tx.execute_batch(ENTRY_INDEXES)?;

  tx.commit()
}
