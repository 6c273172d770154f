//! Handlers for `/threads` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/threads` | Manual order, then most recently touched |
//! | `POST`   | `/threads` | Body: [`NewThread`]; returns 201 + thread |
//! | `PUT`    | `/threads/order` | Body: [`ReorderBody`]; returns 204 |
//! | `PUT`    | `/threads/{id}` | Body: [`NewThread`]; full replace |
//! | `DELETE` | `/threads/{id}` | Cascades; attachment files are swept |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use dialedger_core::{
  ThreadId,
  store::LedgerStore,
  thread::{DeletedThread, NewThread, Thread, ThreadOrder},
};
use serde::Deserialize;

use crate::{AppState, error::ApiError, sweep_files};

/// `GET /threads`
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<Thread>>, ApiError>
where
  S: LedgerStore,
{
  let threads = state.store.list_threads().await.map_err(ApiError::classify)?;
  Ok(Json(threads))
}

/// `POST /threads`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewThread>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore,
{
  let thread = state.store.create_thread(body).await.map_err(ApiError::classify)?;
  Ok((StatusCode::CREATED, Json(thread)))
}

/// `PUT /threads/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<ThreadId>,
  Json(body): Json<NewThread>,
) -> Result<Json<Thread>, ApiError>
where
  S: LedgerStore,
{
  let thread = state
    .store
    .update_thread(id, body)
    .await
    .map_err(ApiError::classify)?;
  Ok(Json(thread))
}

/// `DELETE /threads/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<ThreadId>,
) -> Result<Json<DeletedThread>, ApiError>
where
  S: LedgerStore,
{
  let deleted = state.store.delete_thread(id).await.map_err(ApiError::classify)?;
  sweep_files(&state.files, &deleted.attachments).await;
  Ok(Json(deleted))
}

// ─── Reorder ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
  #[serde(alias = "threadOrders")]
  pub thread_orders: Vec<ThreadOrder>,
}

/// `PUT /threads/order`; all or nothing.
pub async fn reorder<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<ReorderBody>,
) -> Result<StatusCode, ApiError>
where
  S: LedgerStore,
{
  state
    .store
    .reorder_threads(body.thread_orders)
    .await
    .map_err(ApiError::classify)?;
  Ok(StatusCode::NO_CONTENT)
}
