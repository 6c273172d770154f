//! Error types for `dialedger-core`.

use std::path::PathBuf;

use thiserror::Error;

use crate::id::{AttachmentId, EntryId, ThreadId};

#[derive(Debug, Error)]
pub enum Error {
  /// The caller supplied a disallowed or empty value.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("thread not found: {0}")]
  ThreadNotFound(ThreadId),

  #[error("entry not found: {0}")]
  EntryNotFound(EntryId),

  #[error("attachment not found: {0}")]
  AttachmentNotFound(AttachmentId),

  /// The attachment row exists but its managed copy is gone from disk.
  #[error("attachment file missing on disk: {}", path.display())]
  PhysicalFileMissing { path: PathBuf },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// The outcome classes every caller-facing operation must keep distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  NotFound,
  PhysicalFileMissing,
  Storage,
}

impl ErrorKind {
  /// Stable machine-readable code, e.g. for API error bodies.
  pub fn code(self) -> &'static str {
    match self {
      Self::Validation => "validation",
      Self::NotFound => "not_found",
      Self::PhysicalFileMissing => "file_missing",
      Self::Storage => "storage",
    }
  }
}

/// Implemented by every backend error so callers can tell validation,
/// not-found, missing-file and storage failures apart without knowing the
/// backend.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::ThreadNotFound(_)
      | Self::EntryNotFound(_)
      | Self::AttachmentNotFound(_) => ErrorKind::NotFound,
      Self::PhysicalFileMissing { .. } => ErrorKind::PhysicalFileMissing,
      Self::Serialization(_) => ErrorKind::Storage,
    }
  }
}
