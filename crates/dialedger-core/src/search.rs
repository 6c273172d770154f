//! Search query and result types.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entry::{Entry, EntryType},
  id::ThreadId,
  thread::Thread,
};

/// Optional narrowing applied to entry matches. Thread matches are never
/// filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
  /// When non-empty, only entries whose type is in this set are returned.
  #[serde(alias = "entryTypes")]
  pub entry_types: Vec<EntryType>,
  #[serde(alias = "threadId")]
  pub thread_id:   Option<ThreadId>,
}

/// A validated, trimmed, non-empty search query.
#[derive(Debug, Clone)]
pub struct SearchQuery {
  text:    String,
  options: SearchOptions,
}

impl SearchQuery {
  pub fn new(text: &str, options: SearchOptions) -> Result<Self> {
    let text = text.trim();
    if text.is_empty() {
      return Err(Error::validation("search query is empty"));
    }
    Ok(Self { text: text.to_owned(), options })
  }

  pub fn text(&self) -> &str { &self.text }

  pub fn options(&self) -> &SearchOptions { &self.options }

  /// `%text%` with `\`, `%` and `_` escaped for `LIKE ... ESCAPE '\'`.
  pub fn like_pattern(&self) -> String {
    let mut out = String::with_capacity(self.text.len() + 2);
    out.push('%');
    for c in self.text.chars() {
      if matches!(c, '\\' | '%' | '_') {
        out.push('\\');
      }
      out.push(c);
    }
    out.push('%');
    out
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
  pub threads: Vec<Thread>,
  pub entries: Vec<EntryHit>,
}

/// An entry match, enriched with its thread's title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHit {
  #[serde(flatten)]
  pub entry:                Entry,
  pub thread_title:         String,
  /// File names of this entry's attachments that matched the query. Other
  /// attachments of the same entry are not listed.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub matching_attachments: Vec<String>,
}
