//! [`SqliteStore`]: the SQLite implementation of [`LedgerStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, Transaction, params, params_from_iter};
use tracing::debug;

use dialedger_core::{
  AttachmentId, EntryId, ThreadId,
  attachment::{Attachment, NewAttachment},
  entry::{DeletedEntry, Entry, EntryPatch, NewEntry},
  search::{SearchQuery, SearchResults},
  store::LedgerStore,
  thread::{DeletedThread, NewThread, Thread, ThreadOrder, validate_orders},
  time::parse_timestamp,
};

use crate::{
  Error, Result,
  encode::{
    ATTACHMENT_COLUMNS, ENTRY_COLUMNS, RawAttachment, RawEntry, RawThread,
    THREAD_COLUMNS, decode_rows, encode_dt, encode_metadata, encode_path,
    encode_text, next_after,
  },
  schema::{self, MigrationReport},
  search,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  migrations: Arc<MigrationReport>,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, create the schema and apply any
  /// pending migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let report = conn
      .call(|conn| Ok(schema::initialize(conn)?))
      .await?;
    Ok(Self { conn, migrations: Arc::new(report) })
  }

  /// Outcome of each migration attempted when this store was opened.
  pub fn migration_report(&self) -> &MigrationReport { &self.migrations }
}

// ─── Transaction helpers ─────────────────────────────────────────────────────

/// Advance a thread's `updated_at`. Returns `false` if the thread is absent.
/// An unreadable stored value is replaced with the current time.
fn touch_thread(tx: &Transaction<'_>, thread_id: i64) -> Result<bool> {
  let Some(prev) = tx
    .query_row(
      "SELECT updated_at FROM threads WHERE id = ?1",
      [thread_id],
      |r| r.get::<_, Option<String>>(0),
    )
    .optional()?
  else {
    return Ok(false);
  };
  let prev = prev.as_deref().and_then(parse_timestamp);
  tx.execute(
    "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
    params![encode_dt(next_after(prev)), thread_id],
  )?;
  Ok(true)
}

fn select_thread(tx: &rusqlite::Connection, id: i64) -> Result<Option<RawThread>> {
  Ok(
    tx.query_row(
      &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1"),
      [id],
      RawThread::from_row,
    )
    .optional()?,
  )
}

fn select_entry(tx: &rusqlite::Connection, id: i64) -> Result<Option<RawEntry>> {
  Ok(
    tx.query_row(
      &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
      [id],
      RawEntry::from_row,
    )
    .optional()?,
  )
}

fn select_attachment(
  tx: &rusqlite::Connection,
  id: i64,
) -> Result<Option<RawAttachment>> {
  Ok(
    tx.query_row(
      &format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1"),
      [id],
      RawAttachment::from_row,
    )
    .optional()?,
  )
}

/// Attachments of every entry matched by `where_clause` (over `entries e`).
fn select_attachments_of_entries(
  tx: &rusqlite::Connection,
  where_clause: &str,
  id: i64,
) -> Result<Vec<RawAttachment>> {
  let columns = ATTACHMENT_COLUMNS
    .split(", ")
    .map(|c| format!("a.{c}"))
    .collect::<Vec<_>>()
    .join(", ");
  let mut stmt = tx.prepare(&format!(
    "SELECT {columns} FROM attachments a
     JOIN entries e ON e.id = a.entry_id
     WHERE {where_clause}
     ORDER BY a.id"
  ))?;
  Ok(
    stmt
      .query_map([id], RawAttachment::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?,
  )
}

/// Run `f` on the connection thread, converting store errors raised inside
/// the closure back out of `tokio_rusqlite`.
async fn with_conn<R, F>(conn: &tokio_rusqlite::Connection, f: F) -> Result<R>
where
  R: Send + 'static,
  F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
{
  conn
    .call(move |conn| Ok(f(conn)))
    .await?
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = Error;

  // ── Threads ───────────────────────────────────────────────────────────────

  async fn list_threads(&self) -> Result<Vec<Thread>> {
    let raws: Vec<RawThread> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {THREAD_COLUMNS} FROM threads
           ORDER BY display_order ASC, updated_at DESC, id ASC"
        ))?;
        let rows = stmt
          .query_map([], RawThread::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(decode_rows(raws, RawThread::into_thread))
  }

  async fn create_thread(&self, new: NewThread) -> Result<Thread> {
    let (title, description) = new.normalized()?;
    let now = encode_dt(Utc::now());

    let raw = with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      let max: Option<i64> =
        tx.query_row("SELECT MAX(display_order) FROM threads", [], |r| r.get(0))?;
      let order = max.unwrap_or(0) + 1;
      tx.execute(
        "INSERT INTO threads (title, description, created_at, updated_at, display_order)
         VALUES (?1, ?2, ?3, ?3, ?4)",
        params![title, description, now, order],
      )?;
      let raw = select_thread(&tx, tx.last_insert_rowid())?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
      tx.commit()?;
      Ok(raw)
    })
    .await?;

    let thread = raw.into_thread()?;
    debug!(thread_id = %thread.id, order = thread.display_order, "created thread");
    Ok(thread)
  }

  async fn update_thread(&self, id: ThreadId, update: NewThread) -> Result<Thread> {
    let (title, description) = update.normalized()?;

    let raw = with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      if !touch_thread(&tx, id.0)? {
        return Ok(None);
      }
      tx.execute(
        "UPDATE threads SET title = ?1, description = ?2 WHERE id = ?3",
        params![title, description, id.0],
      )?;
      let raw = select_thread(&tx, id.0)?;
      tx.commit()?;
      Ok(raw)
    })
    .await?;

    raw
      .ok_or(dialedger_core::Error::ThreadNotFound(id))?
      .into_thread()
  }

  async fn delete_thread(&self, id: ThreadId) -> Result<DeletedThread> {
    let raws = with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      let attachments =
        select_attachments_of_entries(&tx, "e.thread_id = ?1", id.0)?;
      // Entries and their attachments go with the thread via ON DELETE CASCADE.
      let removed = tx.execute("DELETE FROM threads WHERE id = ?1", [id.0])?;
      if removed == 0 {
        return Ok(None);
      }
      tx.commit()?;
      Ok(Some(attachments))
    })
    .await?
    .ok_or(dialedger_core::Error::ThreadNotFound(id))?;

    let attachments = decode_rows(raws, RawAttachment::into_attachment);
    debug!(thread_id = %id, attachments = attachments.len(), "deleted thread");
    Ok(DeletedThread { thread_id: id, attachments })
  }

  async fn reorder_threads(&self, orders: Vec<ThreadOrder>) -> Result<()> {
    validate_orders(&orders)?;

    let missing = with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      {
        let mut stmt =
          tx.prepare("UPDATE threads SET display_order = ?1 WHERE id = ?2")?;
        for o in &orders {
          if stmt.execute(params![o.order, o.id.0])? == 0 {
            // Dropping the transaction rolls back the rows already updated.
            return Ok(Some(o.id));
          }
        }
      }
      tx.commit()?;
      Ok(None)
    })
    .await?;

    match missing {
      Some(id) => Err(dialedger_core::Error::ThreadNotFound(id).into()),
      None => Ok(()),
    }
  }

  // ── Entries ───────────────────────────────────────────────────────────────

  async fn list_entries(&self, thread_id: ThreadId) -> Result<Vec<Entry>> {
    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENTRY_COLUMNS} FROM entries
           WHERE thread_id = ?1
           ORDER BY entry_date ASC, id ASC"
        ))?;
        let rows = stmt
          .query_map([thread_id.0], RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(decode_rows(raws, RawEntry::into_entry))
  }

  async fn create_entry(&self, new: NewEntry) -> Result<Entry> {
    let thread_id = new.thread_id;
    let entry_type = new.entry_type.as_str();
    let title = encode_text(new.title);
    let content = encode_text(new.content);
    let entry_date = encode_dt(new.entry_date);
    let metadata = encode_metadata(new.metadata.as_ref())?;
    let now = encode_dt(Utc::now());

    let raw = with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      if !touch_thread(&tx, thread_id.0)? {
        return Ok(None);
      }
      tx.execute(
        "INSERT INTO entries
           (thread_id, entry_type, title, content, entry_date, created_at, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![thread_id.0, entry_type, title, content, entry_date, now, metadata],
      )?;
      let raw = select_entry(&tx, tx.last_insert_rowid())?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
      tx.commit()?;
      Ok(Some(raw))
    })
    .await?;

    let entry = raw
      .ok_or(dialedger_core::Error::ThreadNotFound(thread_id))?
      .into_entry()?;
    debug!(entry_id = %entry.id, thread_id = %thread_id, entry_type, "created entry");
    Ok(entry)
  }

  async fn update_entry(&self, id: EntryId, patch: EntryPatch) -> Result<Entry> {
    use rusqlite::types::Value;

    let mut sets: Vec<(&'static str, Value)> = Vec::new();
    if let Some(title) = patch.title {
      sets.push(("title", encode_text(title).map_or(Value::Null, Value::Text)));
    }
    if let Some(content) = patch.content {
      sets.push((
        "content",
        encode_text(content).map_or(Value::Null, Value::Text),
      ));
    }
    if let Some(entry_date) = patch.entry_date {
      sets.push(("entry_date", Value::Text(encode_dt(entry_date))));
    }
    if let Some(metadata) = patch.metadata {
      sets.push((
        "metadata",
        encode_metadata(metadata.as_ref())?.map_or(Value::Null, Value::Text),
      ));
    }

    let raw = with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      let Some(thread_id) = tx
        .query_row("SELECT thread_id FROM entries WHERE id = ?1", [id.0], |r| {
          r.get::<_, i64>(0)
        })
        .optional()?
      else {
        return Ok(None);
      };

      if !sets.is_empty() {
        let assignments = sets
          .iter()
          .enumerate()
          .map(|(i, (col, _))| format!("{col} = ?{}", i + 1))
          .collect::<Vec<_>>()
          .join(", ");
        let sql = format!(
          "UPDATE entries SET {assignments} WHERE id = ?{}",
          sets.len() + 1
        );
        let values = sets
          .into_iter()
          .map(|(_, v)| v)
          .chain(std::iter::once(Value::Integer(id.0)));
        tx.execute(&sql, params_from_iter(values))?;
      }

      touch_thread(&tx, thread_id)?;
      let raw = select_entry(&tx, id.0)?;
      tx.commit()?;
      Ok(raw)
    })
    .await?;

    raw
      .ok_or(dialedger_core::Error::EntryNotFound(id))?
      .into_entry()
  }

  async fn delete_entry(&self, id: EntryId) -> Result<DeletedEntry> {
    let (thread_id, raws) = with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      let Some(thread_id) = tx
        .query_row("SELECT thread_id FROM entries WHERE id = ?1", [id.0], |r| {
          r.get::<_, i64>(0)
        })
        .optional()?
      else {
        return Ok(None);
      };
      let attachments = select_attachments_of_entries(&tx, "e.id = ?1", id.0)?;
      tx.execute("DELETE FROM entries WHERE id = ?1", [id.0])?;
      touch_thread(&tx, thread_id)?;
      tx.commit()?;
      Ok(Some((thread_id, attachments)))
    })
    .await?
    .ok_or(dialedger_core::Error::EntryNotFound(id))?;

    let attachments = decode_rows(raws, RawAttachment::into_attachment);
    Ok(DeletedEntry { entry_id: id, thread_id: ThreadId(thread_id), attachments })
  }

  // ── Attachments ───────────────────────────────────────────────────────────

  async fn create_attachment(&self, new: NewAttachment) -> Result<Attachment> {
    let entry_id = new.entry_id;
    let file_name = new.file_name.trim().to_owned();
    if file_name.is_empty() {
      return Err(dialedger_core::Error::validation("file name is required").into());
    }
    let file_path = encode_path(&new.file_path);
    let now = encode_dt(Utc::now());

    let raw = with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      let exists = tx
        .query_row("SELECT 1 FROM entries WHERE id = ?1", [entry_id.0], |_| Ok(()))
        .optional()?
        .is_some();
      if !exists {
        return Ok(None);
      }
      tx.execute(
        "INSERT INTO attachments
           (entry_id, file_name, file_path, file_size, mime_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![entry_id.0, file_name, file_path, new.file_size, new.mime_type, now],
      )?;
      let raw = select_attachment(&tx, tx.last_insert_rowid())?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
      tx.commit()?;
      Ok(Some(raw))
    })
    .await?;

    raw
      .ok_or(dialedger_core::Error::EntryNotFound(entry_id))?
      .into_attachment()
  }

  async fn list_attachments(&self, entry_id: EntryId) -> Result<Vec<Attachment>> {
    let raws: Vec<RawAttachment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ATTACHMENT_COLUMNS} FROM attachments
           WHERE entry_id = ?1
           ORDER BY id ASC"
        ))?;
        let rows = stmt
          .query_map([entry_id.0], RawAttachment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(decode_rows(raws, RawAttachment::into_attachment))
  }

  async fn get_attachment(&self, id: AttachmentId) -> Result<Attachment> {
    with_conn(&self.conn, move |conn| select_attachment(conn, id.0))
      .await?
      .ok_or(dialedger_core::Error::AttachmentNotFound(id))?
      .into_attachment()
  }

  async fn delete_attachment(&self, id: AttachmentId) -> Result<Attachment> {
    with_conn(&self.conn, move |conn| {
      let tx = conn.transaction()?;
      let Some(raw) = select_attachment(&tx, id.0)? else {
        return Ok(None);
      };
      tx.execute("DELETE FROM attachments WHERE id = ?1", [id.0])?;
      tx.commit()?;
      Ok(Some(raw))
    })
    .await?
    .ok_or(dialedger_core::Error::AttachmentNotFound(id))?
    .into_attachment()
  }

  // ── Search ────────────────────────────────────────────────────────────────

  async fn search<'a>(&'a self, query: &'a SearchQuery) -> Result<SearchResults> {
    let pattern = query.like_pattern();
    let options = query.options().clone();

    let (raw_threads, raw_hits) = self
      .conn
      .call(move |conn| {
        let threads = search::find_threads(conn, &pattern)?;
        let hits = search::find_entries(conn, &pattern, &options)?;
        Ok((threads, hits))
      })
      .await?;

    let threads = decode_rows(raw_threads, RawThread::into_thread);
    let entries = decode_rows(raw_hits, search::RawHit::into_hit);

    debug!(
      query = query.text(),
      threads = threads.len(),
      entries = entries.len(),
      "search"
    );
    Ok(SearchResults { threads, entries })
  }
}

#[cfg(test)]
impl SqliteStore {
  pub(crate) async fn conn_for_test<R, F>(&self, f: F) -> Result<R>
  where
    R: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
  {
    with_conn(&self.conn, move |conn| Ok(f(conn)?)).await
  }

  pub(crate) async fn raw_sql_of(&self, table: &'static str) -> Result<Option<String>> {
    self.conn_for_test(move |conn| schema::table_sql(conn, table)).await
  }

  pub(crate) async fn thread_updated_at(
    &self,
    id: ThreadId,
  ) -> Result<chrono::DateTime<Utc>> {
    let s: String = self
      .conn_for_test(move |conn| {
        conn.query_row("SELECT updated_at FROM threads WHERE id = ?1", [id.0], |r| {
          r.get(0)
        })
      })
      .await?;
    crate::encode::decode_dt(&s)
  }
}
