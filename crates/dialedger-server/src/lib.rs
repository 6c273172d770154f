//! dialedger HTTP server: configuration and application assembly.
//!
//! The binary in `main.rs` is a thin wrapper over [`load_config`], [`open`]
//! and [`app`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, State},
  routing::get,
};
use dialedger_api::{AppState, FileStore, api_router};
use dialedger_store_sqlite::{MigrationReport, SqliteStore};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const DATABASE_FILE: &str = "dialedger.db";

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `DIALEDGER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  #[serde(default = "default_data_dir")]
  pub data_dir:         PathBuf,
  /// Defaults to `<data_dir>/attachments`.
  #[serde(default)]
  pub attachments_dir:  Option<PathBuf>,
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes: usize,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 3001 }
fn default_data_dir() -> PathBuf { PathBuf::from("~/.local/share/dialedger") }
fn default_max_upload_bytes() -> usize { 50 * 1024 * 1024 }

impl ServerConfig {
  pub fn data_dir(&self) -> PathBuf { expand_tilde(&self.data_dir) }

  pub fn database_path(&self) -> PathBuf { self.data_dir().join(DATABASE_FILE) }

  pub fn attachments_dir(&self) -> PathBuf {
    match &self.attachments_dir {
      Some(dir) => expand_tilde(dir),
      None => self.data_dir().join("attachments"),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Layer `path` (optional) under `DIALEDGER_*` environment variables.
pub fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("DIALEDGER").try_parsing(true))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Startup ─────────────────────────────────────────────────────────────────

/// Open the store and the attachment directory named by `config`.
///
/// Migration failures do not stop startup; they are logged and visible at
/// `GET /health`.
pub async fn open(config: &ServerConfig) -> anyhow::Result<AppState<SqliteStore>> {
  let data_dir = config.data_dir();
  tokio::fs::create_dir_all(&data_dir)
    .await
    .with_context(|| format!("failed to create data directory {data_dir:?}"))?;

  let db_path = config.database_path();
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;
  log_migrations(store.migration_report());

  let files = FileStore::new(config.attachments_dir());
  files
    .ensure_root()
    .await
    .with_context(|| format!("failed to create {:?}", files.root()))?;

  info!(db = %db_path.display(), attachments = %files.root().display(), "store ready");
  Ok(AppState::new(store, files))
}

fn log_migrations(report: &MigrationReport) {
  for step in report.failures() {
    warn!(migration = step.name, outcome = ?step.outcome, "schema migration failed; continuing");
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The API under `/api`, a `/health` status route, body limits and request tracing.
pub fn app(state: AppState<SqliteStore>, config: &ServerConfig) -> Router {
  let status = Router::new()
    .route("/health", get(health))
    .with_state(Arc::clone(&state.store));

  Router::new()
    .nest("/api", api_router(state))
    .merge(status)
    .layer(DefaultBodyLimit::max(config.max_upload_bytes))
    .layer(TraceLayer::new_for_http())
}

/// `GET /health`
async fn health(State(store): State<Arc<SqliteStore>>) -> Json<Value> {
  let report = store.migration_report();
  Json(json!({
    "status": if report.is_clean() { "ok" } else { "degraded" },
    "migrations": report,
  }))
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use tower::ServiceExt as _;

  use super::*;

  fn config_in(dir: &Path) -> ServerConfig {
    ServerConfig {
      host:             "127.0.0.1".to_owned(),
      port:             0,
      data_dir:         dir.to_path_buf(),
      attachments_dir:  None,
      max_upload_bytes: 1024,
    }
  }

  #[test]
  fn missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.port, 3001);
    assert_eq!(cfg.max_upload_bytes, 50 * 1024 * 1024);
    assert!(cfg.attachments_dir().ends_with("attachments"));
  }

  #[test]
  fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
      &path,
      "port = 4100\ndata_dir = \"/var/lib/dialedger\"\nattachments_dir = \"/srv/files\"\n",
    )
    .unwrap();
    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.address(), "127.0.0.1:4100");
    assert_eq!(cfg.database_path(), PathBuf::from("/var/lib/dialedger/dialedger.db"));
    assert_eq!(cfg.attachments_dir(), PathBuf::from("/srv/files"));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/ledger")),
      PathBuf::from(home).join("ledger")
    );
    assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
  }

  #[tokio::test]
  async fn open_creates_database_and_attachment_root() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir.path().join("data"));
    let state = open(&cfg).await.unwrap();

    assert!(cfg.database_path().exists());
    assert!(cfg.attachments_dir().is_dir());
    assert!(state.store.migration_report().is_clean());
  }

  #[tokio::test]
  async fn health_reports_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    let router = app(open(&cfg).await.unwrap(), &cfg);

    let resp = router
      .oneshot(Request::get("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["migrations"]["steps"].as_array().unwrap().len() >= 2);
  }

  #[tokio::test]
  async fn health_is_degraded_after_a_failed_migration() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    rusqlite::Connection::open(cfg.database_path())
      .unwrap()
      .execute_batch(
        "CREATE TABLE entries (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           thread_id INTEGER NOT NULL,
           entry_type TEXT NOT NULL CHECK(entry_type IN ('note')),
           title TEXT,
           content TEXT,
           entry_date DATETIME NOT NULL,
           created_at DATETIME DEFAULT CURRENT_TIMESTAMP
         );",
      )
      .unwrap();

    let state = open(&cfg).await.unwrap();
    assert!(!state.store.migration_report().is_clean());

    let resp = app(state, &cfg)
      .oneshot(Request::get("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "degraded");
    let failed: Vec<_> = body["migrations"]["steps"]
      .as_array()
      .unwrap()
      .iter()
      .filter(|s| s["outcome"]["status"] == "failed")
      .map(|s| s["name"].as_str().unwrap())
      .collect();
    assert_eq!(failed, ["entries_entry_type_constraint"]);
  }

  #[tokio::test]
  async fn oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    let router = app(open(&cfg).await.unwrap(), &cfg);

    let boundary = "b";
    let mut body = format!(
      "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"big.bin\"\r\n\r\n"
    )
    .into_bytes();
    body.extend(std::iter::repeat_n(b'x', 4096));
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let req = Request::post("/api/eml/parse")
      .header("content-type", format!("multipart/form-data; boundary={boundary}"))
      .body(Body::from(body))
      .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
  }
}
