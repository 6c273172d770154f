//! Threads: the top-level topics that own entries.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, attachment::Attachment, id::ThreadId};

/// A top-level topic. List position is `display_order` ascending, ties broken
/// by `updated_at` descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
  pub id:            ThreadId,
  pub title:         String,
  pub description:   Option<String>,
  pub created_at:    DateTime<Utc>,
  /// Advanced whenever the thread or any of its entries changes.
  pub updated_at:    DateTime<Utc>,
  pub display_order: i64,
}

/// Input to [`crate::store::LedgerStore::create_thread`] and the full-replace
/// [`crate::store::LedgerStore::update_thread`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewThread {
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
}

impl NewThread {
  pub fn new(title: impl Into<String>) -> Self {
    Self { title: title.into(), description: None }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// Trim the title and reject it when empty. An empty description is stored
  /// as absent.
  pub fn normalized(self) -> Result<(String, Option<String>)> {
    let title = self.title.trim();
    if title.is_empty() {
      return Err(Error::validation("thread title is required"));
    }
    let description = self.description.filter(|d| !d.trim().is_empty());
    Ok((title.to_owned(), description))
  }
}

/// One element of a manual reordering request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadOrder {
  pub id:    ThreadId,
  pub order: i64,
}

/// Reject an ordering list that is empty or names a thread twice.
pub fn validate_orders(orders: &[ThreadOrder]) -> Result<()> {
  if orders.is_empty() {
    return Err(Error::validation("thread order list is empty"));
  }
  let mut seen = HashSet::with_capacity(orders.len());
  for o in orders {
    if !seen.insert(o.id) {
      return Err(Error::Validation(format!(
        "thread {} appears more than once in order list",
        o.id
      )));
    }
  }
  Ok(())
}

/// Returned by [`crate::store::LedgerStore::delete_thread`].
///
/// The rows in `attachments` are already gone; their files are still on disk
/// and must be removed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedThread {
  pub thread_id:   ThreadId,
  pub attachments: Vec<Attachment>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_title_is_rejected() {
    let err = NewThread::new("   ").normalized().unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn empty_description_becomes_none() {
    let (title, desc) = NewThread::new(" Taxes ")
      .with_description("")
      .normalized()
      .unwrap();
    assert_eq!(title, "Taxes");
    assert_eq!(desc, None);
  }

  #[test]
  fn duplicate_ids_in_order_list_are_rejected() {
    let orders = [
      ThreadOrder { id: ThreadId(1), order: 0 },
      ThreadOrder { id: ThreadId(1), order: 1 },
    ];
    assert!(matches!(validate_orders(&orders), Err(Error::Validation(_))));
    assert!(matches!(validate_orders(&[]), Err(Error::Validation(_))));
  }
}
