//! Error type for `dialedger-store-sqlite`.

use dialedger_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Validation and not-found conditions raised by the store.
  #[error(transparent)]
  Core(#[from] dialedger_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row holds a value no current type can represent.
  #[error("unreadable row {id} in {table}: {detail}")]
  Corrupt { table: &'static str, id: i64, detail: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::Database(_) | Self::Sqlite(_) | Self::Json(_)
      | Self::DateParse(_)
      | Self::Corrupt { .. } => {
        ErrorKind::Storage
      }
    }
  }
}
