//! Attachments: records of files copied into managed storage.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AttachmentId, EntryId};

/// A file linked to exactly one entry. No bytes live in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
  pub id:         AttachmentId,
  pub entry_id:   EntryId,
  /// The name the file was uploaded under; shown to users and searched.
  pub file_name:  String,
  /// Location of the managed copy, never the original upload path.
  pub file_path:  PathBuf,
  pub file_size:  Option<i64>,
  pub mime_type:  Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::LedgerStore::create_attachment`].
///
/// `file_path` must already point at a durable copy inside managed storage.
#[derive(Debug, Clone)]
pub struct NewAttachment {
  pub entry_id:  EntryId,
  pub file_name: String,
  pub file_path: PathBuf,
  pub file_size: Option<i64>,
  pub mime_type: Option<String>,
}
