//! JSON REST API for dialedger.
//!
//! Exposes an axum [`Router`] backed by any
//! [`dialedger_core::store::LedgerStore`] plus a [`FileStore`] for attachment
//! bytes. Transport concerns (listening, body limits, tracing layers) are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new().nest("/api", dialedger_api::api_router(state))
//! ```
//!
//! Failures are JSON `{"error": message, "code": kind}` where `code` is one
//! of `validation` (400), `not_found` (404), `file_missing` (404) or
//! `storage` (500).

pub mod attachments;
pub mod eml;
pub mod entries;
pub mod error;
pub mod files;
pub mod search;
pub mod threads;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use dialedger_core::store::LedgerStore;

pub use error::{ApiError, FileError};
pub use files::FileStore;

/// Shared handler state.
pub struct AppState<S> {
  pub store: Arc<S>,
  pub files: Arc<FileStore>,
}

impl<S> AppState<S> {
  pub fn new(store: S, files: FileStore) -> Self {
    Self { store: Arc::new(store), files: Arc::new(files) }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), files: Arc::clone(&self.files) }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: LedgerStore + 'static,
{
  Router::new()
    // Threads
    .route("/threads", get(threads::list::<S>).post(threads::create::<S>))
    .route("/threads/order", put(threads::reorder::<S>))
    .route(
      "/threads/{id}",
      put(threads::update::<S>).delete(threads::remove::<S>),
    )
    .route("/threads/{id}/entries", get(entries::list::<S>))
    // Entries
    .route("/entries", post(entries::create::<S>))
    .route(
      "/entries/{id}",
      put(entries::update::<S>).delete(entries::remove::<S>),
    )
    .route(
      "/entries/{id}/attachments",
      get(attachments::list::<S>).post(attachments::upload::<S>),
    )
    // Attachments
    .route(
      "/attachments/{id}",
      get(attachments::get_one::<S>).delete(attachments::remove::<S>),
    )
    .route("/attachments/{id}/download", get(attachments::download::<S>))
    // Search
    .route("/search", post(search::handler::<S>))
    // Email import
    .route("/eml/parse", post(eml::parse))
    .with_state(state)
}

/// Remove the files behind attachments whose rows are already gone.
///
/// Failures are logged, not returned: the rows cannot be restored.
pub(crate) async fn sweep_files(
  files: &FileStore,
  attachments: &[dialedger_core::attachment::Attachment],
) {
  for a in attachments {
    if let Err(e) = files.delete_if_exists(&a.file_path).await {
      tracing::warn!(attachment = %a.id, error = %e, "orphaned attachment file");
    }
  }
}

#[cfg(test)]
mod tests;
