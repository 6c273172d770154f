//! Handler for `POST /search`.
//!
//! Body: `{"query": "...", "options": {"entry_types": [...], "thread_id": n}}`.
//! A blank query is rejected with 400 rather than matching everything.

use axum::{Json, extract::State};
use dialedger_core::{
  search::{SearchOptions, SearchQuery, SearchResults},
  store::LedgerStore,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SearchBody {
  #[serde(default)]
  pub query:   String,
  #[serde(default)]
  pub options: SearchOptions,
}

/// `POST /search`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<SearchBody>,
) -> Result<Json<SearchResults>, ApiError>
where
  S: LedgerStore,
{
  let query = SearchQuery::new(&body.query, body.options)?;
  let results = state.store.search(&query).await.map_err(ApiError::classify)?;
  Ok(Json(results))
}
