//! Strongly-typed row identifiers.
//!
//! Ids are the SQLite `INTEGER PRIMARY KEY` values; the newtypes keep a thread
//! id from being passed where an entry id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! row_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
      }
    }

    impl From<i64> for $name {
      fn from(raw: i64) -> Self { Self(raw) }
    }
  };
}

row_id!(
  /// Identifies a [`crate::thread::Thread`].
  ThreadId
);
row_id!(
  /// Identifies a [`crate::entry::Entry`].
  EntryId
);
row_id!(
  /// Identifies a [`crate::attachment::Attachment`].
  AttachmentId
);
