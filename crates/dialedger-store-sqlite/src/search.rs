//! Substring search across threads, entries and attachment file names.
//!
//! Runs synchronously inside a `tokio_rusqlite` call. Matching is SQLite
//! `LIKE`, so it is case-insensitive for ASCII only. Entry metadata is matched
//! as its stored JSON text, keys and punctuation included.

use dialedger_core::search::{EntryHit, SearchOptions};
use rusqlite::{Connection, params_from_iter, types::Value};

use crate::{
  Result,
  encode::{ENTRY_COLUMNS, RawEntry, RawRow, RawThread, THREAD_COLUMNS},
};

/// One matched entry row before decoding.
pub struct RawHit {
  pub entry:                RawEntry,
  pub thread_title:         String,
  pub matching_attachments: Vec<String>,
}

impl RawRow for RawHit {
  const TABLE: &'static str = RawEntry::TABLE;

  fn id(&self) -> i64 { self.entry.id }
}

impl RawHit {
  pub fn into_hit(self) -> Result<EntryHit> {
    Ok(EntryHit {
      entry:                self.entry.into_entry()?,
      thread_title:         self.thread_title,
      matching_attachments: self.matching_attachments,
    })
  }
}

pub fn find_threads(
  conn: &Connection,
  pattern: &str,
) -> rusqlite::Result<Vec<RawThread>> {
  let mut stmt = conn.prepare(&format!(
    r"SELECT {THREAD_COLUMNS} FROM threads
      WHERE title LIKE ?1 ESCAPE '\' OR description LIKE ?1 ESCAPE '\'
      ORDER BY updated_at DESC, id DESC"
  ))?;
  stmt
    .query_map([pattern], RawThread::from_row)?
    .collect()
}

pub fn find_entries(
  conn: &Connection,
  pattern: &str,
  options: &SearchOptions,
) -> rusqlite::Result<Vec<RawHit>> {
  let entry_columns = ENTRY_COLUMNS
    .split(", ")
    .map(|c| format!("e.{c}"))
    .collect::<Vec<_>>()
    .join(", ");

  let mut params: Vec<Value> = vec![Value::Text(pattern.to_owned())];
  let mut conds: Vec<String> = vec![
    r"(e.title LIKE ?1 ESCAPE '\'
       OR e.content LIKE ?1 ESCAPE '\'
       OR e.metadata LIKE ?1 ESCAPE '\'
       OR EXISTS (
         SELECT 1 FROM attachments a
         WHERE a.entry_id = e.id AND a.file_name LIKE ?1 ESCAPE '\'
       ))"
      .to_owned(),
  ];

  if !options.entry_types.is_empty() {
    let placeholders = options
      .entry_types
      .iter()
      .map(|t| {
        params.push(Value::Text(t.as_str().to_owned()));
        format!("?{}", params.len())
      })
      .collect::<Vec<_>>()
      .join(", ");
    conds.push(format!("e.entry_type IN ({placeholders})"));
  }

  if let Some(thread_id) = options.thread_id {
    params.push(Value::Integer(thread_id.0));
    conds.push(format!("e.thread_id = ?{}", params.len()));
  }

  let sql = format!(
    "SELECT {entry_columns}, t.title
     FROM entries e
     JOIN threads t ON t.id = e.thread_id
     WHERE {}
     ORDER BY e.entry_date DESC, e.id DESC",
    conds.join(" AND ")
  );

  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params_from_iter(params.iter()), |row| {
      Ok((RawEntry::from_row(row)?, row.get::<_, String>(8)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut attachments = conn.prepare(
    r"SELECT file_name FROM attachments
      WHERE entry_id = ?1 AND file_name LIKE ?2 ESCAPE '\'
      ORDER BY id",
  )?;

  rows
    .into_iter()
    .map(|(entry, thread_title)| {
      let matching_attachments = attachments
        .query_map(rusqlite::params![entry.id, pattern], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
      Ok(RawHit { entry, thread_title, matching_attachments })
    })
    .collect()
}
