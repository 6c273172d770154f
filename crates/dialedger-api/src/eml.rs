//! Handler for `POST /eml/parse`.
//!
//! Accepts a multipart field `file` holding a raw RFC 5322 message and
//! returns the extracted [`ParsedEmail`]. Nothing is persisted; the caller
//! creates the email entry from the result.

use axum::{Json, extract::Multipart};
use dialedger_eml::ParsedEmail;

use crate::error::ApiError;

/// `POST /eml/parse`
pub async fn parse(mut multipart: Multipart) -> Result<Json<ParsedEmail>, ApiError> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() == Some("file") {
      let bytes = field.bytes().await?;
      let email = dialedger_eml::parse(&bytes)?;
      tracing::debug!(
        subject = %email.subject,
        attachments = email.attachments.len(),
        "parsed message"
      );
      return Ok(Json(email));
    }
  }
  Err(ApiError::BadRequest("missing multipart field `file`".to_owned()))
}
