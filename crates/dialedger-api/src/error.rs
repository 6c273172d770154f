//! API error types and [`axum::response::IntoResponse`] implementation.

use std::path::PathBuf;

use axum::{
  Json,
  extract::multipart::MultipartError,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use dialedger_core::{Classify, ErrorKind};
use serde_json::json;
use thiserror::Error;

// ─── File storage ────────────────────────────────────────────────────────────

/// An error from [`FileStore`](crate::files::FileStore).
#[derive(Debug, Error)]
pub enum FileError {
  /// Carries [`dialedger_core::Error::PhysicalFileMissing`].
  #[error(transparent)]
  Core(#[from] dialedger_core::Error),

  #[error("i/o error on {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl FileError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }

  pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
    Self::Core(dialedger_core::Error::PhysicalFileMissing { path: path.into() })
  }
}

impl Classify for FileError {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::Io { .. } => ErrorKind::Storage,
    }
  }
}

// ─── Handler errors ──────────────────────────────────────────────────────────

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  PayloadTooLarge(String),

  #[error("{0}")]
  NotFound(String),

  /// The record exists but its bytes are gone from disk.
  #[error("{0}")]
  FileMissing(String),

  #[error("storage error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map any classified error onto its HTTP outcome.
  pub fn classify<E>(err: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    match err.kind() {
      ErrorKind::Validation => Self::BadRequest(err.to_string()),
      ErrorKind::NotFound => Self::NotFound(err.to_string()),
      ErrorKind::PhysicalFileMissing => Self::FileMissing(err.to_string()),
      ErrorKind::Storage => Self::Store(Box::new(err)),
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::BadRequest(_) | Self::PayloadTooLarge(_) => ErrorKind::Validation,
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::FileMissing(_) => ErrorKind::PhysicalFileMissing,
      Self::Store(_) => ErrorKind::Storage,
    }
  }

  fn status(&self) -> StatusCode {
    if let Self::PayloadTooLarge(_) = self {
      return StatusCode::PAYLOAD_TOO_LARGE;
    }
    match self.kind() {
      ErrorKind::Validation => StatusCode::BAD_REQUEST,
      ErrorKind::NotFound | ErrorKind::PhysicalFileMissing => StatusCode::NOT_FOUND,
      ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<dialedger_core::Error> for ApiError {
  fn from(e: dialedger_core::Error) -> Self { Self::classify(e) }
}

impl From<FileError> for ApiError {
  fn from(e: FileError) -> Self { Self::classify(e) }
}

impl From<dialedger_eml::Error> for ApiError {
  fn from(e: dialedger_eml::Error) -> Self {
    Self::BadRequest(format!("could not parse message: {e}"))
  }
}

impl From<MultipartError> for ApiError {
  fn from(e: MultipartError) -> Self {
    let message = format!("multipart error: {}", e.body_text());
    match e.status() {
      StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge(message),
      _ => Self::BadRequest(message),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if let Self::Store(e) = &self {
      tracing::error!(error = %e, "request failed");
    }
    let body = json!({ "error": self.to_string(), "code": self.kind().code() });
    (status, Json(body)).into_response()
  }
}
