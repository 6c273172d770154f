//! Timestamp parsing shared by the store and the API boundary.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

/// Naive layouts accepted in addition to RFC 3339. Naive values are taken to
/// be UTC. The first matches SQLite's `CURRENT_TIMESTAMP`; the `T` forms
/// match HTML `datetime-local` inputs.
const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M",
];

/// Parse a timestamp in any of the layouts the store has ever written.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  NAIVE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .map(|naive| naive.and_utc())
}

/// Parse a caller-supplied `entry_date`. Empty or unparseable input is a
/// validation failure; the store never substitutes "now".
pub fn parse_entry_date(s: &str) -> Result<DateTime<Utc>> {
  if s.trim().is_empty() {
    return Err(Error::validation("entry_date is required"));
  }
  parse_timestamp(s)
    .ok_or_else(|| Error::Validation(format!("invalid entry_date: {s:?}")))
}
