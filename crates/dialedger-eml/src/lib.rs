//! RFC 5322 / MIME message parser for dialedger's email import.
//!
//! Turns a raw `.eml` file into the fields of an email entry. Pure
//! synchronous; no HTTP or database dependencies. Attachment bytes are only
//! measured, never returned.
//!
//! # Quick start
//!
//! ```no_run
//! let raw = b"From: a@example.com\r\nSubject: Hi\r\n\r\nHello\r\n";
//! let email = dialedger_eml::parse(raw).unwrap();
//! assert_eq!(email.subject, "Hi");
//! ```

pub mod error;
mod decode;
mod parse;

use chrono::{DateTime, Utc};
use dialedger_core::metadata::EmailMetadata;
use serde::{Deserialize, Serialize};

pub use error::{Error, Result};

// ─── Public types ────────────────────────────────────────────────────────────

/// The fields extracted from one message. Header values are decoded from
/// RFC 2047 encoded words; missing headers are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEmail {
  pub from:        String,
  pub to:          String,
  pub cc:          String,
  pub bcc:         String,
  pub subject:     String,
  /// The first `text/plain` part, else the first `text/html` part.
  pub body:        String,
  pub date:        Option<DateTime<Utc>>,
  pub message_id:  String,
  /// Only parts that carry a file name.
  pub attachments: Vec<EmlAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmlAttachment {
  pub filename:     String,
  pub content_type: String,
  /// Decoded size in bytes.
  pub size:         usize,
}

impl ParsedEmail {
  /// The metadata payload for an `email` entry.
  pub fn into_metadata(self) -> EmailMetadata {
    let attachments = self
      .attachments
      .iter()
      .map(|a| a.filename.as_str())
      .collect::<Vec<_>>()
      .join(", ");
    EmailMetadata {
      from: self.from,
      to: self.to,
      cc: self.cc,
      bcc: self.bcc,
      subject: self.subject,
      body: self.body,
      attachments,
    }
  }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse one message.
pub fn parse(input: &[u8]) -> Result<ParsedEmail> { parse::parse_message(input) }
