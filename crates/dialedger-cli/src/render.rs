//! Plain-text tables for terminal output.

use chrono::{DateTime, Utc};
use dialedger_core::{
  attachment::Attachment,
  entry::Entry,
  metadata::EntryMetadata,
  search::SearchResults,
  thread::Thread,
};

const TITLE_WIDTH: usize = 48;

fn date(dt: &DateTime<Utc>) -> String { dt.format("%Y-%m-%d %H:%M").to_string() }

/// Cut `s` to `width` characters, marking the cut with `…`.
fn clip(s: &str, width: usize) -> String {
  let s = s.replace(['\n', '\r'], " ");
  if s.chars().count() <= width {
    return s;
  }
  let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
  out.push('…');
  out
}

fn human_size(bytes: Option<i64>) -> String {
  let Some(bytes) = bytes else { return "-".to_owned() };
  const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
  let mut size = bytes as f64;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  if unit == 0 { format!("{bytes} B") } else { format!("{size:.1} {}", UNITS[unit]) }
}

/// A one-line label for an entry: its title, else a summary of its metadata.
pub fn entry_label(entry: &Entry) -> String {
  if let Some(title) = entry.title.as_deref().filter(|t| !t.trim().is_empty()) {
    return title.to_owned();
  }
  match entry.typed_metadata() {
    Ok(Some(meta)) => {
      let headline = meta.headline();
      match &meta {
        EntryMetadata::ActionItems(items) => {
          let (done, total) = items.progress();
          format!("{headline} [{done}/{total}]")
        }
        _ => headline,
      }
    }
    _ => entry.content.clone().unwrap_or_default(),
  }
}

pub fn threads(threads: &[Thread]) -> String {
  let mut out = format!("{:>5}  {:>5}  {:<16}  {}\n", "ID", "ORDER", "UPDATED", "TITLE");
  for t in threads {
    out.push_str(&format!(
      "{:>5}  {:>5}  {:<16}  {}\n",
      t.id,
      t.display_order,
      date(&t.updated_at),
      clip(&t.title, TITLE_WIDTH)
    ));
  }
  out
}

pub fn entries(entries: &[Entry]) -> String {
  let mut out = format!("{:>5}  {:<16}  {:<12}  {}\n", "ID", "DATE", "TYPE", "SUMMARY");
  for e in entries {
    out.push_str(&format!(
      "{:>5}  {:<16}  {:<12}  {}\n",
      e.id,
      date(&e.entry_date),
      e.entry_type,
      clip(&entry_label(e), TITLE_WIDTH)
    ));
  }
  out
}

pub fn attachments(attachments: &[Attachment]) -> String {
  let mut out = format!("{:>5}  {:>10}  {:<24}  {}\n", "ID", "SIZE", "TYPE", "NAME");
  for a in attachments {
    out.push_str(&format!(
      "{:>5}  {:>10}  {:<24}  {}\n",
      a.id,
      human_size(a.file_size),
      clip(a.mime_type.as_deref().unwrap_or("-"), 24),
      a.file_name
    ));
  }
  out
}

pub fn search(results: &SearchResults) -> String {
  let mut out = String::new();
  if !results.threads.is_empty() {
    out.push_str(&format!("Threads ({})\n", results.threads.len()));
    out.push_str(&threads(&results.threads));
  }
  if !results.entries.is_empty() {
    if !out.is_empty() {
      out.push('\n');
    }
    out.push_str(&format!("Entries ({})\n", results.entries.len()));
    for hit in &results.entries {
      let e = &hit.entry;
      out.push_str(&format!(
        "{:>5}  {:<16}  {:<12}  {}  ({})\n",
        e.id,
        date(&e.entry_date),
        e.entry_type,
        clip(&entry_label(e), TITLE_WIDTH),
        clip(&hit.thread_title, 24)
      ));
      if !hit.matching_attachments.is_empty() {
        out.push_str(&format!(
          "{:>5}  matched attachment: {}\n",
          "",
          hit.matching_attachments.join(", ")
        ));
      }
    }
  }
  if out.is_empty() {
    out.push_str("No matches.\n");
  }
  out
}
