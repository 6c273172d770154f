//! Error types for the dialedger-eml parser.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The input has no header block, or the block holds no `Name: value` line.
  #[error("message has no header section")]
  MissingHeaders,

  #[error("invalid base64 body: {0}")]
  Base64(#[from] base64::DecodeError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
