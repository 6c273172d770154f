//! Async HTTP client wrapping the dialedger JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use dialedger_core::{
  AttachmentId, EntryId, ThreadId,
  attachment::Attachment,
  entry::{DeletedEntry, Entry},
  search::{SearchOptions, SearchResults},
  thread::{DeletedThread, Thread, ThreadOrder},
};
use dialedger_eml::ParsedEmail;
use reqwest::{
  Client, RequestBuilder, Response,
  multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;

/// Connection settings for the dialedger API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// The server's error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
  error: String,
  #[serde(default)]
  code:  String,
}

/// Async HTTP client for the dialedger JSON REST API.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// Send `req`, turning a non-2xx status into an error carrying the
  /// server's message.
  async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
    debug!(request = what, "sending");
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    match resp.json::<ErrorBody>().await {
      Ok(body) if body.code.is_empty() => Err(anyhow!("{what} → {status}: {}", body.error)),
      Ok(body) => Err(anyhow!("{what} → {status} ({}): {}", body.code, body.error)),
      Err(_) => Err(anyhow!("{what} → {status}")),
    }
  }

  async fn json<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    self
      .send(req, what)
      .await?
      .json()
      .await
      .with_context(|| format!("deserialising response to {what}"))
  }

  // ── Threads ───────────────────────────────────────────────────────────────

  /// `GET /api/threads`
  pub async fn list_threads(&self) -> Result<Vec<Thread>> {
    self.json(self.client.get(self.url("/threads")), "GET /threads").await
  }

  /// `POST /api/threads`
  pub async fn create_thread(
    &self,
    title: &str,
    description: Option<&str>,
  ) -> Result<Thread> {
    let body = json!({ "title": title, "description": description });
    self
      .json(self.client.post(self.url("/threads")).json(&body), "POST /threads")
      .await
  }

  /// `PUT /api/threads/{id}`
  pub async fn update_thread(
    &self,
    id: ThreadId,
    title: &str,
    description: Option<&str>,
  ) -> Result<Thread> {
    let body = json!({ "title": title, "description": description });
    self
      .json(
        self.client.put(self.url(&format!("/threads/{id}"))).json(&body),
        "PUT /threads/{id}",
      )
      .await
  }

  /// `DELETE /api/threads/{id}`
  pub async fn delete_thread(&self, id: ThreadId) -> Result<DeletedThread> {
    self
      .json(
        self.client.delete(self.url(&format!("/threads/{id}"))),
        "DELETE /threads/{id}",
      )
      .await
  }

  /// `PUT /api/threads/order`
  pub async fn reorder_threads(&self, orders: &[ThreadOrder]) -> Result<()> {
    let body = json!({ "thread_orders": orders });
    self
      .send(
        self.client.put(self.url("/threads/order")).json(&body),
        "PUT /threads/order",
      )
      .await?;
    Ok(())
  }

  // ── Entries ───────────────────────────────────────────────────────────────

  /// `GET /api/threads/{id}/entries`
  pub async fn list_entries(&self, thread_id: ThreadId) -> Result<Vec<Entry>> {
    self
      .json(
        self.client.get(self.url(&format!("/threads/{thread_id}/entries"))),
        "GET /threads/{id}/entries",
      )
      .await
  }

  /// `POST /api/entries`; `body` is the JSON entry as the server expects it.
  pub async fn create_entry(&self, body: &Value) -> Result<Entry> {
    self
      .json(self.client.post(self.url("/entries")).json(body), "POST /entries")
      .await
  }

  /// `PUT /api/entries/{id}`; only the keys present in `patch` change.
  pub async fn update_entry(&self, id: EntryId, patch: &Value) -> Result<Entry> {
    self
      .json(
        self.client.put(self.url(&format!("/entries/{id}"))).json(patch),
        "PUT /entries/{id}",
      )
      .await
  }

  /// `DELETE /api/entries/{id}`
  pub async fn delete_entry(&self, id: EntryId) -> Result<DeletedEntry> {
    self
      .json(
        self.client.delete(self.url(&format!("/entries/{id}"))),
        "DELETE /entries/{id}",
      )
      .await
  }

  // ── Attachments ───────────────────────────────────────────────────────────

  /// `GET /api/entries/{id}/attachments`
  pub async fn list_attachments(&self, entry_id: EntryId) -> Result<Vec<Attachment>> {
    self
      .json(
        self.client.get(self.url(&format!("/entries/{entry_id}/attachments"))),
        "GET /entries/{id}/attachments",
      )
      .await
  }

  /// `POST /api/entries/{id}/attachments`
  pub async fn upload_attachment(
    &self,
    entry_id: EntryId,
    file_name: &str,
    mime_type: Option<&str>,
    bytes: Vec<u8>,
  ) -> Result<Attachment> {
    let mut part = Part::bytes(bytes).file_name(file_name.to_owned());
    if let Some(mime) = mime_type {
      part = part.mime_str(mime).context("invalid mime type")?;
    }
    let form = Form::new().part("file", part);
    self
      .json(
        self
          .client
          .post(self.url(&format!("/entries/{entry_id}/attachments")))
          .multipart(form),
        "POST /entries/{id}/attachments",
      )
      .await
  }

  /// `GET /api/attachments/{id}/download`
  pub async fn download_attachment(&self, id: AttachmentId) -> Result<Vec<u8>> {
    let resp = self
      .send(
        self.client.get(self.url(&format!("/attachments/{id}/download"))),
        "GET /attachments/{id}/download",
      )
      .await?;
    let bytes = resp.bytes().await.context("reading attachment body")?;
    Ok(bytes.to_vec())
  }

  /// `GET /api/attachments/{id}`
  pub async fn get_attachment(&self, id: AttachmentId) -> Result<Attachment> {
    self
      .json(
        self.client.get(self.url(&format!("/attachments/{id}"))),
        "GET /attachments/{id}",
      )
      .await
  }

  /// `DELETE /api/attachments/{id}`
  pub async fn delete_attachment(&self, id: AttachmentId) -> Result<Attachment> {
    self
      .json(
        self.client.delete(self.url(&format!("/attachments/{id}"))),
        "DELETE /attachments/{id}",
      )
      .await
  }

  // ── Search ────────────────────────────────────────────────────────────────

  /// `POST /api/search`
  pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResults> {
    let body = json!({ "query": query, "options": options });
    self
      .json(self.client.post(self.url("/search")).json(&body), "POST /search")
      .await
  }

  // ── Email import ──────────────────────────────────────────────────────────

  /// `POST /api/eml/parse`
  pub async fn parse_eml(&self, file_name: &str, bytes: Vec<u8>) -> Result<ParsedEmail> {
    let part = Part::bytes(bytes)
      .file_name(file_name.to_owned())
      .mime_str("message/rfc822")
      .context("invalid mime type")?;
    let form = Form::new().part("file", part);
    self
      .json(
        self.client.post(self.url("/eml/parse")).multipart(form),
        "POST /eml/parse",
      )
      .await
  }
}
