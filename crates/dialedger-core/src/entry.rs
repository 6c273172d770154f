//! Entries: dated, typed records within a thread.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator as _, IntoStaticStr};

use crate::{
  Error, Result,
  attachment::Attachment,
  id::{EntryId, ThreadId},
  metadata::EntryMetadata,
};

// ─── EntryType ───────────────────────────────────────────────────────────────

/// The six kinds of entry. The snake_case name is the value stored in the
/// `entry_type` column and is fixed for the life of the entry.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  IntoStaticStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntryType {
  Note,
  Meeting,
  Conversation,
  Email,
  File,
  ActionItems,
}

impl EntryType {
  /// Every allowed value, in declaration order.
  pub const ALL: [Self; 6] = [
    Self::Note,
    Self::Meeting,
    Self::Conversation,
    Self::Email,
    Self::File,
    Self::ActionItems,
  ];

  pub fn as_str(self) -> &'static str { self.into() }
}

impl fmt::Display for EntryType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

impl FromStr for EntryType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::iter()
      .find(|t| t.as_ref() == s)
      .ok_or_else(|| Error::Validation(format!("unknown entry type: {s:?}")))
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// A persisted entry.
///
/// `metadata` is exactly the JSON value the caller supplied; use
/// [`Entry::typed_metadata`] for the per-type view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
  pub id:         EntryId,
  pub thread_id:  ThreadId,
  pub entry_type: EntryType,
  pub title:      Option<String>,
  /// Legacy free-text column; current entry types keep their text in
  /// `metadata`.
  pub content:    Option<String>,
  /// Caller-supplied; when the recorded event happened.
  pub entry_date: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
  pub metadata:   Option<serde_json::Value>,
}

impl Entry {
  /// Decode `metadata` into the variant for this entry's type. Missing fields
  /// take their defaults; `None` when the entry carries no metadata.
  pub fn typed_metadata(&self) -> Result<Option<EntryMetadata>> {
    self
      .metadata
      .clone()
      .map(|data| EntryMetadata::from_parts(self.entry_type, data))
      .transpose()
  }
}

/// Input to [`crate::store::LedgerStore::create_entry`].
#[derive(Debug, Clone)]
pub struct NewEntry {
  pub thread_id:  ThreadId,
  pub entry_type: EntryType,
  pub title:      Option<String>,
  pub content:    Option<String>,
  pub entry_date: DateTime<Utc>,
  pub metadata:   Option<serde_json::Value>,
}

impl NewEntry {
  pub fn new(
    thread_id: ThreadId,
    entry_type: EntryType,
    entry_date: DateTime<Utc>,
  ) -> Self {
    Self {
      thread_id,
      entry_type,
      title: None,
      content: None,
      entry_date,
      metadata: None,
    }
  }

  pub fn with_title(mut self, title: impl Into<String>) -> Self {
    self.title = Some(title.into());
    self
  }

  pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
    self.metadata = Some(metadata);
    self
  }

  /// Build from a typed metadata payload; the entry type is taken from the
  /// variant.
  pub fn from_metadata(
    thread_id: ThreadId,
    entry_date: DateTime<Utc>,
    metadata: &EntryMetadata,
  ) -> Result<Self> {
    Ok(
      Self::new(thread_id, metadata.entry_type(), entry_date)
        .with_metadata(metadata.to_json()?),
    )
  }
}

/// A partial update. The outer `Option` says whether the field was supplied;
/// for nullable columns the inner `Option` is the new value, so
/// `Some(None)` clears the column while `None` leaves it untouched.
///
/// There is deliberately no `entry_type` field.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
  pub title:      Option<Option<String>>,
  pub content:    Option<Option<String>>,
  pub entry_date: Option<DateTime<Utc>>,
  pub metadata:   Option<Option<serde_json::Value>>,
}

impl EntryPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.content.is_none()
      && self.entry_date.is_none()
      && self.metadata.is_none()
  }
}

/// Returned by [`crate::store::LedgerStore::delete_entry`]: the attachment
/// rows that existed immediately before the delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedEntry {
  pub entry_id:    EntryId,
  pub thread_id:   ThreadId,
  pub attachments: Vec<Attachment>,
}
