//! Handlers for `/entries` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/threads/{id}/entries` | Chronological by `entry_date` |
//! | `POST`   | `/entries` | Body: [`NewEntryBody`]; returns 201 + entry |
//! | `PUT`    | `/entries/{id}` | Body: [`EntryPatchBody`]; absent fields are left alone |
//! | `DELETE` | `/entries/{id}` | Returns the removed attachments; their files are swept |
//!
//! `entry_date` accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` or
//! `YYYY-MM-DD HH:MM:SS`; naive values are read as UTC.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use dialedger_core::{
  EntryId, ThreadId,
  entry::{DeletedEntry, Entry, EntryPatch, EntryType, NewEntry},
  store::LedgerStore,
  time::parse_entry_date,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{AppState, error::ApiError, sweep_files};

/// `GET /threads/{id}/entries`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Path(thread_id): Path<ThreadId>,
) -> Result<Json<Vec<Entry>>, ApiError>
where
  S: LedgerStore,
{
  let entries = state
    .store
    .list_entries(thread_id)
    .await
    .map_err(ApiError::classify)?;
  Ok(Json(entries))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /entries`.
#[derive(Debug, Deserialize)]
pub struct NewEntryBody {
  #[serde(alias = "threadId")]
  pub thread_id:  ThreadId,
  /// Parsed here so an unknown type is a validation error, not a 422.
  #[serde(alias = "entryType")]
  pub entry_type: String,
  #[serde(default)]
  pub title:      Option<String>,
  #[serde(default)]
  pub content:    Option<String>,
  #[serde(alias = "entryDate", default)]
  pub entry_date: String,
  #[serde(default)]
  pub metadata:   Option<Value>,
}

impl TryFrom<NewEntryBody> for NewEntry {
  type Error = dialedger_core::Error;

  fn try_from(b: NewEntryBody) -> Result<Self, Self::Error> {
    Ok(NewEntry {
      thread_id:  b.thread_id,
      entry_type: b.entry_type.parse::<EntryType>()?,
      title:      b.title,
      content:    b.content,
      entry_date: parse_entry_date(&b.entry_date)?,
      metadata:   b.metadata,
    })
  }
}

/// `POST /entries`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewEntryBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore,
{
  let new = NewEntry::try_from(body)?;
  let entry = state.store.create_entry(new).await.map_err(ApiError::classify)?;
  Ok((StatusCode::CREATED, Json(entry)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// Present-but-null becomes `Some(None)`; absent stays `None` via `default`.
fn present<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(d).map(Some)
}

/// JSON body accepted by `PUT /entries/{id}`. `entry_type` is not accepted:
/// an entry's type is fixed at creation.
#[derive(Debug, Default, Deserialize)]
pub struct EntryPatchBody {
  #[serde(default, deserialize_with = "present")]
  pub title:      Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub content:    Option<Option<String>>,
  #[serde(alias = "entryDate", default)]
  pub entry_date: Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub metadata:   Option<Option<Value>>,
}

impl TryFrom<EntryPatchBody> for EntryPatch {
  type Error = dialedger_core::Error;

  fn try_from(b: EntryPatchBody) -> Result<Self, Self::Error> {
    Ok(EntryPatch {
      title:      b.title,
      content:    b.content,
      entry_date: b.entry_date.as_deref().map(parse_entry_date).transpose()?,
      metadata:   b.metadata,
    })
  }
}

/// `PUT /entries/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<EntryId>,
  Json(body): Json<EntryPatchBody>,
) -> Result<Json<Entry>, ApiError>
where
  S: LedgerStore,
{
  let patch = EntryPatch::try_from(body)?;
  let entry = state
    .store
    .update_entry(id, patch)
    .await
    .map_err(ApiError::classify)?;
  Ok(Json(entry))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /entries/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<EntryId>,
) -> Result<Json<DeletedEntry>, ApiError>
where
  S: LedgerStore,
{
  let deleted = state.store.delete_entry(id).await.map_err(ApiError::classify)?;
  sweep_files(&state.files, &deleted.attachments).await;
  Ok(Json(deleted))
}
