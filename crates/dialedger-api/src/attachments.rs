//! Handlers for attachment endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/entries/{id}/attachments` | Insertion order |
//! | `POST`   | `/entries/{id}/attachments` | Multipart field `file`; returns 201 + attachment |
//! | `GET`    | `/attachments/{id}` | Record only |
//! | `GET`    | `/attachments/{id}/download` | Raw bytes; `file_missing` if the copy is gone |
//! | `DELETE` | `/attachments/{id}` | Removes the file, then the record |

use axum::{
  Json,
  extract::{Multipart, Path, State},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use dialedger_core::{
  AttachmentId, EntryId,
  attachment::{Attachment, NewAttachment},
  store::LedgerStore,
};
use tracing::{info, warn};

use crate::{AppState, error::ApiError};

/// `GET /entries/{id}/attachments`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Path(entry_id): Path<EntryId>,
) -> Result<Json<Vec<Attachment>>, ApiError>
where
  S: LedgerStore,
{
  let attachments = state
    .store
    .list_attachments(entry_id)
    .await
    .map_err(ApiError::classify)?;
  Ok(Json(attachments))
}

/// `GET /attachments/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<AttachmentId>,
) -> Result<Json<Attachment>, ApiError>
where
  S: LedgerStore,
{
  let attachment = state.store.get_attachment(id).await.map_err(ApiError::classify)?;
  Ok(Json(attachment))
}

// ─── Upload ──────────────────────────────────────────────────────────────────

struct Upload {
  file_name: String,
  mime_type: Option<String>,
  bytes:     Vec<u8>,
}

/// Pull the `file` field out of a multipart body; other fields are ignored.
async fn read_file_field(multipart: &mut Multipart) -> Result<Upload, ApiError> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some("file") {
      continue;
    }
    let file_name = field
      .file_name()
      .filter(|n| !n.trim().is_empty())
      .unwrap_or("upload")
      .to_owned();
    let mime_type = field.content_type().map(str::to_owned);
    let bytes = field.bytes().await?.to_vec();
    return Ok(Upload { file_name, mime_type, bytes });
  }
  Err(ApiError::BadRequest("missing multipart field `file`".to_owned()))
}

/// `POST /entries/{id}/attachments`
///
/// The body is staged, copied into managed storage, and only then recorded.
/// If the record cannot be created the copy is removed again.
pub async fn upload<S>(
  State(state): State<AppState<S>>,
  Path(entry_id): Path<EntryId>,
  mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore,
{
  let upload = read_file_field(&mut multipart).await?;
  let file_size = i64::try_from(upload.bytes.len()).ok();

  let staged = state.files.stage_upload(&upload.bytes).await?;
  let copied = state.files.copy_in(&staged, &upload.file_name).await;
  if let Err(e) = state.files.delete_if_exists(&staged).await {
    warn!(path = %staged.display(), error = %e, "staging file left behind");
  }
  let file_path = copied?;

  let new = NewAttachment {
    entry_id,
    file_name: upload.file_name,
    file_path: file_path.clone(),
    file_size,
    mime_type: upload.mime_type,
  };
  match state.store.create_attachment(new).await {
    Ok(attachment) => {
      info!(attachment = %attachment.id, entry = %entry_id, "attachment stored");
      Ok((StatusCode::CREATED, Json(attachment)))
    }
    Err(e) => {
      let _ = state.files.delete_if_exists(&file_path).await;
      Err(ApiError::classify(e))
    }
  }
}

// ─── Download ────────────────────────────────────────────────────────────────

/// `attachment; filename="..."` with an RFC 5987 `filename*` for non-ASCII
/// names.
fn content_disposition(file_name: &str) -> HeaderValue {
  let fallback: String = file_name
    .chars()
    .map(|c| match c {
      ' '..='~' if c != '"' && c != '\\' => c,
      _ => '_',
    })
    .collect();
  let mut value = format!("attachment; filename=\"{fallback}\"");
  if !file_name.is_ascii() {
    let encoded: String = file_name
      .bytes()
      .map(|b| match b {
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' => {
          char::from(b).to_string()
        }
        _ => format!("%{b:02X}"),
      })
      .collect();
    value.push_str(&format!("; filename*=UTF-8''{encoded}"));
  }
  HeaderValue::from_str(&value)
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// `GET /attachments/{id}/download`
///
/// Returns the whole file in one body. Files only enter the store through
/// uploads, so their size is bounded by the upload limit.
pub async fn download<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<AttachmentId>,
) -> Result<Response, ApiError>
where
  S: LedgerStore,
{
  let attachment = state.store.get_attachment(id).await.map_err(ApiError::classify)?;
  let bytes = state.files.read(&attachment.file_path).await?;

  let content_type = attachment
    .mime_type
    .as_deref()
    .and_then(|m| HeaderValue::from_str(m).ok())
    .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

  Ok(
    (
      [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_DISPOSITION, content_disposition(&attachment.file_name)),
      ],
      bytes,
    )
      .into_response(),
  )
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /attachments/{id}`
///
/// A file that is already gone does not block removing the record.
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<AttachmentId>,
) -> Result<Json<Attachment>, ApiError>
where
  S: LedgerStore,
{
  let attachment = state.store.get_attachment(id).await.map_err(ApiError::classify)?;
  state.files.delete_if_exists(&attachment.file_path).await?;
  let deleted = state
    .store
    .delete_attachment(id)
    .await
    .map_err(ApiError::classify)?;
  Ok(Json(deleted))
}
