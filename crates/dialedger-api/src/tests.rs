use std::path::PathBuf;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use dialedger_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt as _;

use super::*;

const BOUNDARY: &str = "dialedger-test-boundary";

struct Harness {
  app:   Router,
  files: Arc<FileStore>,
  _dir:  TempDir,
}

async fn harness() -> Harness {
  let dir = tempfile::tempdir().unwrap();
  let store = SqliteStore::open_in_memory().await.unwrap();
  let files = FileStore::new(dir.path().join("attachments"));
  files.ensure_root().await.unwrap();
  let state = AppState::new(store, files);
  let files = Arc::clone(&state.files);
  Harness {
    app: Router::new().nest("/api", api_router(state)),
    files,
    _dir: dir,
  }
}

async fn send_raw(
  app: &Router,
  req: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let headers = resp.headers().clone();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  (status, headers, bytes.to_vec())
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(b) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(b.to_string())),
    None => builder.body(Body::empty()),
  }
  .unwrap();
  let (status, _, bytes) = send_raw(app, req).await;
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

fn multipart(uri: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
  let mut body = format!(
    "--{BOUNDARY}\r\n\
     Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
     Content-Type: {content_type}\r\n\r\n"
  )
  .into_bytes();
  body.extend_from_slice(data);
  body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
  Request::builder()
    .method("POST")
    .uri(uri)
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={BOUNDARY}"),
    )
    .body(Body::from(body))
    .unwrap()
}

async fn create_thread(app: &Router, title: &str) -> i64 {
  let (status, thread) =
    send(app, "POST", "/api/threads", Some(json!({ "title": title }))).await;
  assert_eq!(status, StatusCode::CREATED);
  thread["id"].as_i64().unwrap()
}

async fn create_note(app: &Router, thread_id: i64, text: &str) -> i64 {
  let (status, entry) = send(
    app,
    "POST",
    "/api/entries",
    Some(json!({
      "thread_id": thread_id,
      "entry_type": "note",
      "entry_date": "2024-05-01T09:00:00Z",
      "metadata": { "content": text },
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{entry}");
  entry["id"].as_i64().unwrap()
}

async fn upload(app: &Router, entry_id: i64, name: &str, data: &[u8]) -> Value {
  let req = multipart(
    &format!("/api/entries/{entry_id}/attachments"),
    name,
    "text/plain",
    data,
  );
  let (status, _, bytes) = send_raw(app, req).await;
  assert_eq!(status, StatusCode::CREATED);
  serde_json::from_slice(&bytes).unwrap()
}

fn path_of(attachment: &Value) -> PathBuf {
  PathBuf::from(attachment["file_path"].as_str().unwrap())
}

// ── Threads ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn thread_lifecycle_and_reorder() {
  let h = harness().await;
  let first = create_thread(&h.app, "First").await;
  let second = create_thread(&h.app, "Second").await;

  let (status, _) = send(
    &h.app,
    "PUT",
    "/api/threads/order",
    Some(json!({ "thread_orders": [
      { "id": second, "order": 0 },
      { "id": first, "order": 1 },
    ]})),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, list) = send(&h.app, "GET", "/api/threads", None).await;
  let ids: Vec<i64> = list
    .as_array()
    .unwrap()
    .iter()
    .map(|t| t["id"].as_i64().unwrap())
    .collect();
  assert_eq!(ids, vec![second, first]);

  let (status, updated) = send(
    &h.app,
    "PUT",
    &format!("/api/threads/{first}"),
    Some(json!({ "title": "Renamed", "description": "now with notes" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["title"], "Renamed");
  assert_eq!(updated["description"], "now with notes");
}

#[tokio::test]
async fn blank_title_is_400_and_unknown_thread_is_404() {
  let h = harness().await;
  let (status, body) =
    send(&h.app, "POST", "/api/threads", Some(json!({ "title": "  " }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "validation");

  let (status, body) = send(
    &h.app,
    "PUT",
    "/api/threads/999",
    Some(json!({ "title": "Ghost" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], "not_found");

  let (status, _) = send(&h.app, "DELETE", "/api/threads/999", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Entries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn entry_type_outside_the_enum_is_rejected() {
  let h = harness().await;
  let thread = create_thread(&h.app, "T").await;
  let (status, body) = send(
    &h.app,
    "POST",
    "/api/entries",
    Some(json!({
      "thread_id": thread,
      "entry_type": "diary",
      "entry_date": "2024-05-01T09:00:00Z",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn entry_on_missing_thread_is_404() {
  let h = harness().await;
  let (status, body) = send(
    &h.app,
    "POST",
    "/api/entries",
    Some(json!({
      "thread_id": 42,
      "entry_type": "note",
      "entry_date": "2024-05-01T09:00:00Z",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn partial_update_over_http() {
  let h = harness().await;
  let thread = create_thread(&h.app, "T").await;
  let (_, created) = send(
    &h.app,
    "POST",
    "/api/entries",
    Some(json!({
      "thread_id": thread,
      "entry_type": "meeting",
      "title": "Kickoff",
      "entry_date": "2024-05-01 10:00:00",
      "metadata": { "location": "Room 4", "attendees": "Ana, Ben" },
    })),
  )
  .await;
  let id = created["id"].as_i64().unwrap();

  let (status, updated) = send(
    &h.app,
    "PUT",
    &format!("/api/entries/{id}"),
    Some(json!({ "entry_date": "2024-05-02T11:30" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["title"], "Kickoff");
  assert_eq!(updated["entry_type"], "meeting");
  assert_eq!(updated["metadata"]["location"], "Room 4");
  assert!(updated["entry_date"].as_str().unwrap().starts_with("2024-05-02T11:30"));

  let (_, cleared) = send(
    &h.app,
    "PUT",
    &format!("/api/entries/{id}"),
    Some(json!({ "title": null })),
  )
  .await;
  assert!(cleared["title"].is_null());
  assert_eq!(cleared["metadata"]["attendees"], "Ana, Ben");

  let (_, list) =
    send(&h.app, "GET", &format!("/api/threads/{thread}/entries"), None).await;
  assert_eq!(list.as_array().unwrap().len(), 1);
}

// ── Attachments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_download_and_delete_attachment() {
  let h = harness().await;
  let thread = create_thread(&h.app, "T").await;
  let entry = create_note(&h.app, thread, "see attached").await;

  let attachment = upload(&h.app, entry, "minutes.txt", b"line one\n").await;
  let id = attachment["id"].as_i64().unwrap();
  let stored = path_of(&attachment);
  assert_eq!(attachment["file_name"], "minutes.txt");
  assert_eq!(attachment["file_size"], 9);
  assert_eq!(attachment["mime_type"], "text/plain");
  assert!(stored.starts_with(h.files.root()));
  assert!(!stored.starts_with(h.files.root().join(".incoming")));
  assert!(stored.exists());

  let (_, list) =
    send(&h.app, "GET", &format!("/api/entries/{entry}/attachments"), None).await;
  assert_eq!(list.as_array().unwrap().len(), 1);

  let req = Request::builder()
    .uri(format!("/api/attachments/{id}/download"))
    .body(Body::empty())
    .unwrap();
  let (status, headers, bytes) = send_raw(&h.app, req).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(bytes, b"line one\n");
  assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
  assert_eq!(
    headers[header::CONTENT_DISPOSITION],
    "attachment; filename=\"minutes.txt\""
  );

  let (status, _) =
    send(&h.app, "DELETE", &format!("/api/attachments/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(!stored.exists());

  let (status, _) = send(&h.app, "GET", &format!("/api/attachments/{id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_physical_file_is_distinct_from_missing_record() {
  let h = harness().await;
  let thread = create_thread(&h.app, "T").await;
  let entry = create_note(&h.app, thread, "n").await;
  let attachment = upload(&h.app, entry, "gone.txt", b"bytes").await;
  let id = attachment["id"].as_i64().unwrap();
  std::fs::remove_file(path_of(&attachment)).unwrap();

  let (status, body) =
    send(&h.app, "GET", &format!("/api/attachments/{id}/download"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["code"], "file_missing");

  // The row can still be removed.
  let (status, _) =
    send(&h.app, "DELETE", &format!("/api/attachments/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);

  let (_, body) =
    send(&h.app, "GET", &format!("/api/attachments/{id}/download"), None).await;
  assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn upload_to_missing_entry_leaves_no_file() {
  let h = harness().await;
  let req = multipart("/api/entries/77/attachments", "orphan.txt", "text/plain", b"x");
  let (status, _, _) = send_raw(&h.app, req).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let mut dir = tokio::fs::read_dir(h.files.root()).await.unwrap();
  while let Some(item) = dir.next_entry().await.unwrap() {
    assert!(item.file_type().await.unwrap().is_dir(), "{:?}", item.path());
  }
}

#[tokio::test]
async fn upload_without_file_field_is_400() {
  let h = harness().await;
  let thread = create_thread(&h.app, "T").await;
  let entry = create_note(&h.app, thread, "n").await;
  let body = format!(
    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
  );
  let req = Request::builder()
    .method("POST")
    .uri(format!("/api/entries/{entry}/attachments"))
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={BOUNDARY}"),
    )
    .body(Body::from(body))
    .unwrap();
  let (status, _, _) = send_raw(&h.app, req).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_entry_and_thread_sweeps_files() {
  let h = harness().await;
  let thread = create_thread(&h.app, "T").await;
  let first = create_note(&h.app, thread, "one").await;
  let second = create_note(&h.app, thread, "two").await;
  let a = path_of(&upload(&h.app, first, "a.txt", b"a").await);
  let b = path_of(&upload(&h.app, second, "b.txt", b"b").await);

  let (status, deleted) =
    send(&h.app, "DELETE", &format!("/api/entries/{first}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(deleted["attachments"].as_array().unwrap().len(), 1);
  assert!(!a.exists());
  assert!(b.exists());

  let (status, deleted) =
    send(&h.app, "DELETE", &format!("/api/threads/{thread}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(deleted["attachments"][0]["file_name"], "b.txt");
  assert!(!b.exists());
}

// ── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn blank_search_is_rejected() {
  let h = harness().await;
  let (status, body) =
    send(&h.app, "POST", "/api/search", Some(json!({ "query": "   " }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn search_reports_matching_attachment_names() {
  let h = harness().await;
  let thread = create_thread(&h.app, "Project X").await;
  let entry = create_note(&h.app, thread, "kickoff").await;
  upload(&h.app, entry, "budget-2024.xlsx", b"..").await;
  upload(&h.app, entry, "agenda.txt", b"..").await;

  let (status, results) = send(
    &h.app,
    "POST",
    "/api/search",
    Some(json!({ "query": "BUDGET", "options": { "entryTypes": ["note"] } })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let hits = results["entries"].as_array().unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0]["thread_title"], "Project X");
  assert_eq!(hits[0]["matching_attachments"], json!(["budget-2024.xlsx"]));
  assert!(results["threads"].as_array().unwrap().is_empty());
}

// ── Email import ────────────────────────────────────────────────────────────

#[tokio::test]
async fn eml_parse_returns_fields_without_persisting() {
  let h = harness().await;
  let raw = b"From: Ana <ana@example.com>\r\n\
To: ben@example.com\r\n\
Subject: Quarterly review\r\n\
Date: Tue, 14 May 2024 08:15:00 +0000\r\n\
\r\n\
See you at nine.\r\n";
  let req = multipart("/api/eml/parse", "review.eml", "message/rfc822", raw);
  let (status, _, bytes) = send_raw(&h.app, req).await;
  assert_eq!(status, StatusCode::OK);
  let email: Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(email["subject"], "Quarterly review");
  assert_eq!(email["from"], "Ana <ana@example.com>");
  assert!(email["body"].as_str().unwrap().contains("See you at nine."));

  let (_, threads) = send(&h.app, "GET", "/api/threads", None).await;
  assert!(threads.as_array().unwrap().is_empty());
}
