//! Message and MIME-part parser.
//!
//! Pipeline:
//!   raw bytes
//!     └─ split_part()      → (headers, body)
//!          └─ walk()          → text bodies + attachments, recursing into
//!                               multipart containers
//!               └─ ParsedEmail

use chrono::{DateTime, Utc};

use crate::{
  EmlAttachment, ParsedEmail, decode,
  error::{Error, Result},
};

/// Guards against pathological nesting.
const MAX_DEPTH: usize = 16;

// ─── Headers ─────────────────────────────────────────────────────────────────

struct Headers(Vec<(String, String)>);

impl Headers {
  /// Unfold continuation lines (RFC 5322 §2.2.3) and split `Name: value`.
  /// Lines without a colon are skipped.
  fn parse(block: &str) -> Self {
    let mut lines: Vec<String> = Vec::new();
    for raw in block.split('\n') {
      let line = raw.strip_suffix('\r').unwrap_or(raw);
      if line.starts_with(' ') || line.starts_with('\t') {
        if let Some(last) = lines.last_mut() {
          last.push(' ');
          last.push_str(line.trim_start());
        }
      } else if !line.is_empty() {
        lines.push(line.to_owned());
      }
    }
    let fields = lines
      .into_iter()
      .filter_map(|l| {
        let (name, value) = l.split_once(':')?;
        let name = name.trim();
        (!name.is_empty() && !name.contains(' '))
          .then(|| (name.to_ascii_lowercase(), value.trim().to_owned()))
      })
      .collect();
    Self(fields)
  }

  fn get(&self, name: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// Decoded value, or empty.
  fn text(&self, name: &str) -> String {
    self.get(name).map(decode::header_words).unwrap_or_default()
  }
}

// ─── Structured header values ────────────────────────────────────────────────

/// `type/subtype; key=value; key="quoted; value"`
struct HeaderValue {
  value:  String,
  params: Vec<(String, String)>,
}

impl HeaderValue {
  fn parse(raw: &str) -> Self {
    let mut segments = split_semicolons_respecting_quotes(raw).into_iter();
    let value = segments
      .next()
      .unwrap_or_default()
      .trim()
      .to_ascii_lowercase();
    let params = segments
      .filter_map(|seg| {
        let (k, v) = seg.split_once('=')?;
        let v = v.trim();
        let v = v
          .strip_prefix('"')
          .and_then(|v| v.strip_suffix('"'))
          .unwrap_or(v);
        Some((k.trim().to_ascii_lowercase(), v.to_owned()))
      })
      .collect();
    Self { value, params }
  }

  fn param(&self, name: &str) -> Option<&str> {
    self
      .params
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str())
  }

  /// A file name parameter in any of its encodings: RFC 2231 `name*`, RFC
  /// 2231 continuations `name*0`, `name*1`, ..., or plain (possibly RFC 2047
  /// encoded).
  fn file_name(&self, name: &str) -> Option<String> {
    if let Some(v) = self.param(&format!("{name}*")) {
      return Some(decode::extended_param(v));
    }
    let mut continued = String::new();
    let mut extended = false;
    for i in 0.. {
      if let Some(v) = self.param(&format!("{name}*{i}*")) {
        continued.push_str(v);
        extended = true;
      } else if let Some(v) = self.param(&format!("{name}*{i}")) {
        continued.push_str(v);
      } else {
        break;
      }
    }
    if !continued.is_empty() {
      return Some(if extended {
        decode::extended_param(&continued)
      } else {
        continued
      });
    }
    self.param(name).map(decode::header_words)
  }
}

/// Split on `;` while respecting double-quoted strings.
fn split_semicolons_respecting_quotes(s: &str) -> Vec<&str> {
  let mut result = Vec::new();
  let mut start = 0usize;
  let mut in_quotes = false;
  for (i, c) in s.char_indices() {
    match c {
      '"' => in_quotes = !in_quotes,
      ';' if !in_quotes => {
        result.push(&s[start..i]);
        start = i + 1;
      }
      _ => {}
    }
  }
  result.push(&s[start..]);
  result
}

// ─── Parts ───────────────────────────────────────────────────────────────────

/// Split at the first empty line. A part with no empty line is all headers.
fn split_part(raw: &[u8]) -> (Headers, &[u8]) {
  let mut i = 0;
  while i < raw.len() {
    let line_end = raw[i..]
      .iter()
      .position(|&b| b == b'\n')
      .map_or(raw.len(), |p| i + p);
    let line = &raw[i..line_end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let next = (line_end + 1).min(raw.len());
    if line.is_empty() {
      let headers = Headers::parse(&String::from_utf8_lossy(&raw[..i]));
      return (headers, &raw[next..]);
    }
    i = next;
  }
  (Headers::parse(&String::from_utf8_lossy(raw)), &[])
}

/// The bodies between `--boundary` delimiter lines, up to `--boundary--`.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
  let delimiter = format!("--{boundary}");
  let delimiter = delimiter.as_bytes();

  let mut parts = Vec::new();
  let mut current: Option<usize> = None;
  let mut i = 0;
  while i < body.len() {
    let line_end = body[i..]
      .iter()
      .position(|&b| b == b'\n')
      .map_or(body.len(), |p| i + p);
    let line = &body[i..line_end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    if let Some(rest) = line.strip_prefix(delimiter) {
      if let Some(start) = current.take() {
        // The line break before a delimiter belongs to the delimiter.
        let mut end = i;
        if end > start && body[end - 1] == b'\n' {
          end -= 1;
        }
        if end > start && body[end - 1] == b'\r' {
          end -= 1;
        }
        parts.push(&body[start..end]);
      }
      if rest.starts_with(b"--") {
        return parts;
      }
      current = Some((line_end + 1).min(body.len()));
    }
    i = line_end + 1;
  }
  // Unterminated final part.
  if let Some(start) = current {
    parts.push(&body[start..]);
  }
  parts
}

#[derive(Default)]
struct Collected {
  plain:       Option<String>,
  html:        Option<String>,
  attachments: Vec<EmlAttachment>,
}

fn walk(raw: &[u8], depth: usize, out: &mut Collected) -> Result<()> {
  let (headers, body) = split_part(raw);
  let content_type = HeaderValue::parse(headers.get("content-type").unwrap_or("text/plain"));
  let disposition = headers.get("content-disposition").map(HeaderValue::parse);
  let encoding = headers.get("content-transfer-encoding").unwrap_or("7bit");

  if content_type.value.starts_with("multipart/")
    && depth < MAX_DEPTH
    && let Some(boundary) = content_type.param("boundary")
  {
    for part in split_multipart(body, boundary) {
      walk(part, depth + 1, out)?;
    }
    return Ok(());
  }

  let file_name = disposition
    .as_ref()
    .and_then(|d| d.file_name("filename"))
    .or_else(|| content_type.file_name("name"))
    .filter(|n| !n.trim().is_empty());
  let is_attachment = file_name.is_some()
    || disposition.as_ref().is_some_and(|d| d.value == "attachment");

  if is_attachment || !content_type.value.starts_with("text/") {
    // Unnamed non-text parts (inline images, signatures) are skipped.
    if let Some(filename) = file_name {
      let size = decode::transfer(body, encoding)?.len();
      out.attachments.push(EmlAttachment {
        filename,
        content_type: content_type.value.clone(),
        size,
      });
    }
    return Ok(());
  }

  let decoded = decode::transfer(body, encoding)?;
  let text = decode::charset(&decoded, content_type.param("charset"));
  match content_type.value.as_str() {
    "text/html" if out.html.is_none() => out.html = Some(text),
    "text/html" => {}
    _ if out.plain.is_none() => out.plain = Some(text),
    _ => {}
  }
  Ok(())
}

/// RFC 5322 date; a trailing `(comment)` such as `(UTC)` is ignored.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
  let value = match value.find('(') {
    Some(i) => &value[..i],
    None => value,
  };
  DateTime::parse_from_rfc2822(value.trim())
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

// ─── Entry point ─────────────────────────────────────────────────────────────

pub fn parse_message(input: &[u8]) -> Result<ParsedEmail> {
  let (headers, _) = split_part(input);
  if headers.0.is_empty() {
    return Err(Error::MissingHeaders);
  }

  let mut collected = Collected::default();
  walk(input, 0, &mut collected)?;

  let body = collected
    .plain
    .or(collected.html)
    .unwrap_or_default();

  Ok(ParsedEmail {
    from: headers.text("from"),
    to: headers.text("to"),
    cc: headers.text("cc"),
    bcc: headers.text("bcc"),
    subject: headers.text("subject"),
    body,
    date: headers.get("date").and_then(parse_date),
    message_id: headers.text("message-id"),
    attachments: collected.attachments,
  })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
