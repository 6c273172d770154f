//! The `LedgerStore` trait.
//!
//! Implemented by storage backends (e.g. `dialedger-store-sqlite`). The API
//! layer depends on this abstraction, not on any concrete backend.
//!
//! Backends never touch the filesystem: operations that remove attachment
//! rows hand the removed records back so the caller can delete the files.

use std::future::Future;

use crate::{
  Classify,
  attachment::{Attachment, NewAttachment},
  entry::{DeletedEntry, Entry, EntryPatch, NewEntry},
  id::{AttachmentId, EntryId, ThreadId},
  search::{SearchQuery, SearchResults},
  thread::{DeletedThread, NewThread, Thread, ThreadOrder},
};

/// Abstraction over a record store backend.
///
/// Every operation that targets one record by id signals not-found when the
/// record is absent; list and search operations return empty results instead.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LedgerStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Threads ───────────────────────────────────────────────────────────

  /// All threads by `display_order` ascending, then `updated_at` descending.
  fn list_threads(
    &self,
  ) -> impl Future<Output = Result<Vec<Thread>, Self::Error>> + Send + '_;

  /// Appends the thread after every existing one.
  fn create_thread(
    &self,
    new: NewThread,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + '_;

  /// Full replace of title and description. Always advances `updated_at`.
  fn update_thread(
    &self,
    id: ThreadId,
    update: NewThread,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + '_;

  /// Delete a thread, its entries and their attachment rows.
  fn delete_thread(
    &self,
    id: ThreadId,
  ) -> impl Future<Output = Result<DeletedThread, Self::Error>> + Send + '_;

  /// Apply every `display_order` in one transaction, or none of them.
  fn reorder_threads(
    &self,
    orders: Vec<ThreadOrder>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Entries ───────────────────────────────────────────────────────────

  /// Entries of one thread by `entry_date` ascending.
  fn list_entries(
    &self,
    thread_id: ThreadId,
  ) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send + '_;

  fn create_entry(
    &self,
    new: NewEntry,
  ) -> impl Future<Output = Result<Entry, Self::Error>> + Send + '_;

  /// Change only the fields present in `patch`.
  fn update_entry(
    &self,
    id: EntryId,
    patch: EntryPatch,
  ) -> impl Future<Output = Result<Entry, Self::Error>> + Send + '_;

  fn delete_entry(
    &self,
    id: EntryId,
  ) -> impl Future<Output = Result<DeletedEntry, Self::Error>> + Send + '_;

  // ── Attachments ───────────────────────────────────────────────────────

  fn create_attachment(
    &self,
    new: NewAttachment,
  ) -> impl Future<Output = Result<Attachment, Self::Error>> + Send + '_;

  /// In insertion order.
  fn list_attachments(
    &self,
    entry_id: EntryId,
  ) -> impl Future<Output = Result<Vec<Attachment>, Self::Error>> + Send + '_;

  fn get_attachment(
    &self,
    id: AttachmentId,
  ) -> impl Future<Output = Result<Attachment, Self::Error>> + Send + '_;

  /// Removes the row and returns it.
  fn delete_attachment(
    &self,
    id: AttachmentId,
  ) -> impl Future<Output = Result<Attachment, Self::Error>> + Send + '_;

  // ── Search ────────────────────────────────────────────────────────────

  /// Case-insensitive substring search over threads and entries.
  fn search<'a>(
    &'a self,
    query: &'a SearchQuery,
  ) -> impl Future<Output = Result<SearchResults, Self::Error>> + Send + 'a;
}
