//! Content-transfer and header-word decoding.

use base64::{
  Engine as _, alphabet,
  engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

use crate::Result;

/// Mail clients routinely drop or mangle trailing padding.
const BASE64: GeneralPurpose = GeneralPurpose::new(
  &alphabet::STANDARD,
  GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn hex_value(b: u8) -> Option<u8> {
  match b {
    b'0'..=b'9' => Some(b - b'0'),
    b'a'..=b'f' => Some(b - b'a' + 10),
    b'A'..=b'F' => Some(b - b'A' + 10),
    _ => None,
  }
}

// ─── Transfer encodings ──────────────────────────────────────────────────────

pub fn base64(body: &[u8]) -> Result<Vec<u8>> {
  let compact: Vec<u8> = body
    .iter()
    .copied()
    .filter(|b| !b.is_ascii_whitespace())
    .collect();
  Ok(BASE64.decode(compact)?)
}

/// RFC 2045 §6.7. `=` at end of line is a soft break; malformed escapes are
/// kept literally. With `underscore_is_space` this is the RFC 2047 `Q` form.
pub fn quoted_printable(body: &[u8], underscore_is_space: bool) -> Vec<u8> {
  let mut out = Vec::with_capacity(body.len());
  let mut i = 0;
  while i < body.len() {
    match body[i] {
      b'=' => {
        let rest = &body[i + 1..];
        if rest.starts_with(b"\r\n") {
          i += 3;
          continue;
        }
        if rest.starts_with(b"\n") {
          i += 2;
          continue;
        }
        if let [hi, lo, ..] = rest
          && let (Some(hi), Some(lo)) = (hex_value(*hi), hex_value(*lo))
        {
          out.push((hi << 4) | lo);
          i += 3;
          continue;
        }
        out.push(b'=');
      }
      b'_' if underscore_is_space => out.push(b' '),
      b => out.push(b),
    }
    i += 1;
  }
  out
}

/// Decode a body according to its `Content-Transfer-Encoding`.
pub fn transfer(body: &[u8], encoding: &str) -> Result<Vec<u8>> {
  match encoding.trim().to_ascii_lowercase().as_str() {
    "base64" => base64(body),
    "quoted-printable" => Ok(quoted_printable(body, false)),
    _ => Ok(body.to_vec()),
  }
}

// ─── Charsets ────────────────────────────────────────────────────────────────

/// UTF-8 and ASCII decode as such; the Latin-1 family maps byte-for-byte.
/// Unknown charsets are tried as UTF-8 first.
pub fn charset(bytes: &[u8], charset: Option<&str>) -> String {
  let latin1 = |b: &[u8]| b.iter().map(|&c| char::from(c)).collect::<String>();
  match charset.map(str::to_ascii_lowercase).as_deref() {
    Some("iso-8859-1" | "latin1" | "windows-1252" | "cp1252") => latin1(bytes),
    _ => match std::str::from_utf8(bytes) {
      Ok(s) => s.to_owned(),
      Err(_) => latin1(bytes),
    },
  }
}

// ─── Header words ────────────────────────────────────────────────────────────

/// Decode one `=?charset?enc?text?=` word; `None` if `word` is not one.
fn encoded_word(word: &str) -> Option<String> {
  let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;
  let mut parts = inner.splitn(3, '?');
  let cs = parts.next()?;
  // RFC 2231 language suffix, e.g. `utf-8*en`.
  let cs = cs.split('*').next().unwrap_or(cs);
  let enc = parts.next()?;
  let text = parts.next()?;
  let bytes = match enc {
    "B" | "b" => base64(text.as_bytes()).ok()?,
    "Q" | "q" => quoted_printable(text.as_bytes(), true),
    _ => return None,
  };
  Some(charset(&bytes, Some(cs)))
}

/// Decode RFC 2047 encoded words in a header value. Whitespace between two
/// adjacent encoded words is dropped.
pub fn header_words(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  let mut pending_space = String::new();
  let mut last_was_encoded = false;

  let mut rest = value;
  while !rest.is_empty() {
    let ws_len = rest.len() - rest.trim_start().len();
    let (ws, after) = rest.split_at(ws_len);
    rest = after;
    if rest.is_empty() {
      out.push_str(ws);
      break;
    }
    pending_space.clear();
    pending_space.push_str(ws);

    let word_len = rest
      .find(char::is_whitespace)
      .unwrap_or(rest.len());
    let (word, after) = rest.split_at(word_len);
    rest = after;

    match encoded_word(word) {
      Some(decoded) => {
        if !last_was_encoded {
          out.push_str(&pending_space);
        }
        out.push_str(&decoded);
        last_was_encoded = true;
      }
      None => {
        out.push_str(&pending_space);
        out.push_str(word);
        last_was_encoded = false;
      }
    }
  }
  out
}

/// RFC 2231 extended parameter value: `charset'lang'percent-encoded`.
pub fn extended_param(value: &str) -> String {
  let mut parts = value.splitn(3, '\'');
  let (cs, encoded) = match (parts.next(), parts.next(), parts.next()) {
    (Some(cs), Some(_lang), Some(encoded)) => (Some(cs), encoded),
    _ => (None, value),
  };
  let bytes = encoded.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    if let [b'%', hi, lo, ..] = bytes[i..]
      && let (Some(hi), Some(lo)) = (hex_value(hi), hex_value(lo))
    {
      out.push((hi << 4) | lo);
      i += 3;
      continue;
    }
    out.push(bytes[i]);
    i += 1;
  }
  charset(&out, cs.filter(|c| !c.is_empty()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quoted_printable_soft_breaks_and_escapes() {
    let body = b"caf=C3=A9 is=\r\n open =3D yes=\nnow";
    assert_eq!(
      String::from_utf8(quoted_printable(body, false)).unwrap(),
      "café is open = yesnow"
    );
  }

  #[test]
  fn malformed_escape_is_kept() {
    assert_eq!(quoted_printable(b"100=ZZ", false), b"100=ZZ");
  }

  #[test]
  fn base64_ignores_line_breaks_and_missing_padding() {
    assert_eq!(base64(b"aGVs\r\nbG8").unwrap(), b"hello");
  }

  #[test]
  fn encoded_words_in_subject() {
    assert_eq!(
      header_words("=?UTF-8?B?w4lsw6h2ZQ==?= =?utf-8?Q?_r=C3=A9union?= notes"),
      "Élève réunion notes"
    );
    assert_eq!(header_words("plain  subject"), "plain  subject");
  }

  #[test]
  fn latin1_charset() {
    assert_eq!(charset(&[0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1")), "café");
  }

  #[test]
  fn rfc2231_filename() {
    assert_eq!(extended_param("utf-8''r%C3%A9sum%C3%A9.pdf"), "résumé.pdf");
  }
}
