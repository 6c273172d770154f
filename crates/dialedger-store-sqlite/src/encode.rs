//! Encoding and decoding helpers between domain types and the values stored
//! in SQLite columns.
//!
//! Timestamps written by this crate are fixed-width RFC 3339 UTC strings with
//! microseconds, so text order equals time order. Older rows may hold
//! SQLite's `CURRENT_TIMESTAMP` form; both decode. Metadata is compact JSON.

use std::path::PathBuf;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use dialedger_core::{
  AttachmentId, EntryId, ThreadId,
  attachment::Attachment,
  entry::{Entry, EntryType},
  thread::Thread,
  time::parse_timestamp,
};
use rusqlite::Row;
use serde_json::Value;
use tracing::warn;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  parse_timestamp(s).ok_or_else(|| Error::DateParse(s.to_owned()))
}

/// A timestamp strictly after `prev`, and no earlier than now.
pub fn next_after(prev: Option<DateTime<Utc>>) -> DateTime<Utc> {
  let now = Utc::now();
  match prev {
    Some(prev) if now <= prev => prev + Duration::microseconds(1),
    _ => now,
  }
}

// ─── Text columns ────────────────────────────────────────────────────────────

/// Empty strings are stored as NULL.
pub fn encode_text(s: Option<String>) -> Option<String> {
  s.filter(|s| !s.is_empty())
}

pub fn encode_path(p: &std::path::Path) -> String {
  p.to_string_lossy().into_owned()
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// JSON `null` is stored as SQL NULL.
pub fn encode_metadata(v: Option<&Value>) -> Result<Option<String>> {
  match v {
    None | Some(Value::Null) => Ok(None),
    Some(v) => Ok(Some(serde_json::to_string(v)?)),
  }
}

/// A stored value that is not valid JSON is returned as a JSON string rather
/// than failing the whole read.
pub fn decode_metadata(s: Option<String>) -> Option<Value> {
  s.map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// A raw row that knows where it came from, for logging decode failures.
pub trait RawRow {
  const TABLE: &'static str;

  fn id(&self) -> i64;
}

/// Decode `raws`, skipping rows that cannot be read. Each skipped row is
/// logged with its table and id.
pub fn decode_rows<R: RawRow, T>(raws: Vec<R>, decode: fn(R) -> Result<T>) -> Vec<T> {
  raws
    .into_iter()
    .filter_map(|raw| {
      let id = raw.id();
      decode(raw)
        .inspect_err(|e| warn!(table = R::TABLE, id, error = %e, "skipping unreadable row"))
        .ok()
    })
    .collect()
}

pub const THREAD_COLUMNS: &str =
  "id, title, description, created_at, updated_at, display_order";

/// Raw values read directly from a `threads` row.
pub struct RawThread {
  pub id:            i64,
  pub title:         String,
  pub description:   Option<String>,
  pub created_at:    String,
  pub updated_at:    String,
  pub display_order: Option<i64>,
}

impl RawRow for RawThread {
  const TABLE: &'static str = "threads";

  fn id(&self) -> i64 { self.id }
}

impl RawThread {
  /// Expects the columns of [`THREAD_COLUMNS`] starting at index 0.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      title:         row.get(1)?,
      description:   row.get(2)?,
      created_at:    row.get(3)?,
      updated_at:    row.get(4)?,
      display_order: row.get(5)?,
    })
  }

  pub fn into_thread(self) -> Result<Thread> {
    Ok(Thread {
      id:            ThreadId(self.id),
      title:         self.title,
      description:   self.description,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
      display_order: self.display_order.unwrap_or(0),
    })
  }
}

pub const ENTRY_COLUMNS: &str =
  "id, thread_id, entry_type, title, content, entry_date, created_at, metadata";

/// Raw values read directly from an `entries` row.
pub struct RawEntry {
  pub id:         i64,
  pub thread_id:  i64,
  pub entry_type: String,
  pub title:      Option<String>,
  pub content:    Option<String>,
  pub entry_date: String,
  pub created_at: String,
  pub metadata:   Option<String>,
}

impl RawRow for RawEntry {
  const TABLE: &'static str = "entries";

  fn id(&self) -> i64 { self.id }
}

impl RawEntry {
  /// Expects the columns of [`ENTRY_COLUMNS`] starting at index 0.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      thread_id:  row.get(1)?,
      entry_type: row.get(2)?,
      title:      row.get(3)?,
      content:    row.get(4)?,
      entry_date: row.get(5)?,
      created_at: row.get(6)?,
      metadata:   row.get(7)?,
    })
  }

  /// An unreadable `entry_date` falls back to `created_at`.
  pub fn into_entry(self) -> Result<Entry> {
    let entry_type = self.entry_type.parse::<EntryType>().map_err(|_| Error::Corrupt {
      table:  "entries",
      id:     self.id,
      detail: format!("unknown entry type {:?}", self.entry_type),
    })?;
    let created_at = decode_dt(&self.created_at)?;
    let entry_date = parse_timestamp(&self.entry_date).unwrap_or_else(|| {
      warn!(entry_id = self.id, entry_date = %self.entry_date, "unreadable entry date; using created_at");
      created_at
    });
    Ok(Entry {
      id:        EntryId(self.id),
      thread_id: ThreadId(self.thread_id),
      entry_type,
      title:     self.title,
      content:   self.content,
      entry_date,
      created_at,
      metadata:  decode_metadata(self.metadata),
    })
  }
}

pub const ATTACHMENT_COLUMNS: &str =
  "id, entry_id, file_name, file_path, file_size, mime_type, created_at";

/// Raw values read directly from an `attachments` row.
pub struct RawAttachment {
  pub id:         i64,
  pub entry_id:   i64,
  pub file_name:  String,
  pub file_path:  String,
  pub file_size:  Option<i64>,
  pub mime_type:  Option<String>,
  pub created_at: String,
}

impl RawRow for RawAttachment {
  const TABLE: &'static str = "attachments";

  fn id(&self) -> i64 { self.id }
}

impl RawAttachment {
  /// Expects the columns of [`ATTACHMENT_COLUMNS`] starting at index 0.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      entry_id:   row.get(1)?,
      file_name:  row.get(2)?,
      file_path:  row.get(3)?,
      file_size:  row.get(4)?,
      mime_type:  row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_attachment(self) -> Result<Attachment> {
    Ok(Attachment {
      id:         AttachmentId(self.id),
      entry_id:   EntryId(self.entry_id),
      file_name:  self.file_name,
      file_path:  PathBuf::from(self.file_path),
      file_size:  self.file_size,
      mime_type:  self.mime_type,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
