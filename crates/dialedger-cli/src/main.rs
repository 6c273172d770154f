//! `dialedger`: command-line client for a dialedger server.
//!
//! # Usage
//!
//! ```text
//! dialedger threads list
//! dialedger threads create "Home purchase" --description "Offers, surveys, solicitor"
//! dialedger entries create 3 --type meeting --date 2024-05-01T10:00 \
//!   --metadata '{"location":"Agent office","attendees":"Sam"}'
//! dialedger attachments add 12 ./survey.pdf
//! dialedger search survey --type file --type email
//! dialedger import-eml 3 ./offer-accepted.eml
//! ```

mod client;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use dialedger_core::{
  AttachmentId, EntryId, ThreadId,
  entry::EntryType,
  metadata::EntryMetadata,
  search::SearchOptions,
  thread::ThreadOrder,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:3001";

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "dialedger", version, about = "Command-line client for dialedger")]
struct Args {
  /// Path to a TOML config file (`url`).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Base URL of the dialedger server (default: http://localhost:3001).
  #[arg(long, env = "DIALEDGER_URL", global = true)]
  url: Option<String>,

  /// Print raw JSON instead of tables.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage threads.
  #[command(subcommand)]
  Threads(ThreadCommand),
  /// Manage entries within a thread.
  #[command(subcommand)]
  Entries(EntryCommand),
  /// Manage files attached to entries.
  #[command(subcommand)]
  Attachments(AttachmentCommand),
  /// Search threads, entries and attachment names.
  Search {
    query:       String,
    /// Restrict to these entry types (repeatable).
    #[arg(long = "type", value_name = "TYPE")]
    entry_types: Vec<EntryType>,
    /// Restrict to one thread.
    #[arg(long)]
    thread:      Option<i64>,
  },
  /// Parse an `.eml` file and record it as an email entry.
  ImportEml {
    thread: i64,
    file:   PathBuf,
    /// Only show what would be recorded.
    #[arg(long)]
    dry_run: bool,
  },
}

#[derive(Subcommand, Debug)]
enum ThreadCommand {
  List,
  Create {
    title:       String,
    #[arg(long)]
    description: Option<String>,
  },
  /// Replace a thread's title and description.
  Update {
    id:          i64,
    title:       String,
    #[arg(long)]
    description: Option<String>,
  },
  Delete { id: i64 },
  /// Set the manual order: thread ids, first to last.
  Reorder {
    #[arg(required = true)]
    ids: Vec<i64>,
  },
}

#[derive(Subcommand, Debug)]
enum EntryCommand {
  List { thread: i64 },
  Create {
    thread:     i64,
    #[arg(long = "type", value_name = "TYPE")]
    entry_type: EntryType,
    #[command(flatten)]
    fields:     EntryFields,
  },
  /// Change only the given fields.
  Update {
    id:          i64,
    #[command(flatten)]
    fields:      EntryFields,
    /// Remove the title.
    #[arg(long, conflicts_with = "title")]
    clear_title: bool,
    /// Remove the metadata.
    #[arg(long, conflicts_with = "metadata")]
    clear_metadata: bool,
  },
  Delete { id: i64 },
}

#[derive(ClapArgs, Debug, Default)]
struct EntryFields {
  #[arg(long)]
  title:    Option<String>,
  /// RFC 3339 or `YYYY-MM-DDTHH:MM`; defaults to now on create.
  #[arg(long)]
  date:     Option<String>,
  /// Metadata payload as JSON.
  #[arg(long, value_parser = parse_json)]
  metadata: Option<Value>,
}

#[derive(Subcommand, Debug)]
enum AttachmentCommand {
  List { entry: i64 },
  Add {
    entry: i64,
    file:  PathBuf,
    /// Stored name; defaults to the file's name.
    #[arg(long)]
    name:  Option<String>,
  },
  /// Save an attachment's bytes to a file.
  Download {
    id:     i64,
    /// Defaults to the attachment's name in the current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  Delete { id: i64 },
}

fn parse_json(s: &str) -> Result<Value, String> {
  serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

fn resolve_url(flag: Option<String>, file_cfg: &ConfigFile) -> String {
  flag
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| DEFAULT_URL.to_string())
}

// ─── Request bodies ──────────────────────────────────────────────────────────

fn new_entry_body(thread: i64, entry_type: EntryType, fields: EntryFields) -> Value {
  let date = fields.date.unwrap_or_else(|| Utc::now().to_rfc3339());
  json!({
    "thread_id": thread,
    "entry_type": entry_type,
    "title": fields.title,
    "entry_date": date,
    "metadata": fields.metadata,
  })
}

/// Only the keys being changed; `null` clears.
fn entry_patch_body(fields: EntryFields, clear_title: bool, clear_metadata: bool) -> Value {
  let mut patch = Map::new();
  if let Some(title) = fields.title {
    patch.insert("title".into(), Value::String(title));
  } else if clear_title {
    patch.insert("title".into(), Value::Null);
  }
  if let Some(date) = fields.date {
    patch.insert("entry_date".into(), Value::String(date));
  }
  if let Some(metadata) = fields.metadata {
    patch.insert("metadata".into(), metadata);
  } else if clear_metadata {
    patch.insert("metadata".into(), Value::Null);
  }
  Value::Object(patch)
}

/// Content type from the file's magic bytes, if recognisable.
fn detect_mime(bytes: &[u8]) -> Option<&'static str> {
  infer::get(bytes).map(|kind| kind.mime_type())
}

fn file_name_of(path: &Path) -> Result<String> {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .with_context(|| format!("{} has no file name", path.display()))
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let client = ApiClient::new(ApiConfig { base_url: resolve_url(args.url, &file_cfg) })?;
  let out = Output { json: args.json };

  match args.command {
    Command::Threads(cmd) => threads(&client, &out, cmd).await,
    Command::Entries(cmd) => entries(&client, &out, cmd).await,
    Command::Attachments(cmd) => attachments(&client, &out, cmd).await,
    Command::Search { query, entry_types, thread } => {
      let options = SearchOptions { entry_types, thread_id: thread.map(ThreadId) };
      let results = client.search(&query, &options).await?;
      out.show(&results, render::search)
    }
    Command::ImportEml { thread, file, dry_run } => {
      import_eml(&client, &out, ThreadId(thread), &file, dry_run).await
    }
  }
}

struct Output {
  json: bool,
}

impl Output {
  fn show<T: Serialize + ?Sized>(&self, value: &T, table: impl Fn(&T) -> String) -> Result<()> {
    if self.json {
      println!("{}", serde_json::to_string_pretty(value)?);
    } else {
      print!("{}", table(value));
    }
    Ok(())
  }
}

async fn threads(client: &ApiClient, out: &Output, cmd: ThreadCommand) -> Result<()> {
  match cmd {
    ThreadCommand::List => {
      let threads = client.list_threads().await?;
      out.show(threads.as_slice(), render::threads)
    }
    ThreadCommand::Create { title, description } => {
      let thread = client.create_thread(&title, description.as_deref()).await?;
      out.show(std::slice::from_ref(&thread), render::threads)
    }
    ThreadCommand::Update { id, title, description } => {
      let thread = client
        .update_thread(ThreadId(id), &title, description.as_deref())
        .await?;
      out.show(std::slice::from_ref(&thread), render::threads)
    }
    ThreadCommand::Delete { id } => {
      let deleted = client.delete_thread(ThreadId(id)).await?;
      out.show(&deleted, |d| {
        format!(
          "Deleted thread {} and {} attachment file(s).\n",
          d.thread_id,
          d.attachments.len()
        )
      })
    }
    ThreadCommand::Reorder { ids } => {
      let orders: Vec<ThreadOrder> = ids
        .iter()
        .zip(0..)
        .map(|(&id, order)| ThreadOrder { id: ThreadId(id), order })
        .collect();
      client.reorder_threads(&orders).await?;
      let threads = client.list_threads().await?;
      out.show(threads.as_slice(), render::threads)
    }
  }
}

async fn entries(client: &ApiClient, out: &Output, cmd: EntryCommand) -> Result<()> {
  match cmd {
    EntryCommand::List { thread } => {
      let entries = client.list_entries(ThreadId(thread)).await?;
      out.show(entries.as_slice(), render::entries)
    }
    EntryCommand::Create { thread, entry_type, fields } => {
      let entry = client
        .create_entry(&new_entry_body(thread, entry_type, fields))
        .await?;
      out.show(std::slice::from_ref(&entry), render::entries)
    }
    EntryCommand::Update { id, fields, clear_title, clear_metadata } => {
      let patch = entry_patch_body(fields, clear_title, clear_metadata);
      if patch.as_object().is_some_and(Map::is_empty) {
        bail!("nothing to update");
      }
      let entry = client.update_entry(EntryId(id), &patch).await?;
      out.show(std::slice::from_ref(&entry), render::entries)
    }
    EntryCommand::Delete { id } => {
      let deleted = client.delete_entry(EntryId(id)).await?;
      out.show(&deleted, |d| {
        format!(
          "Deleted entry {} and {} attachment file(s).\n",
          d.entry_id,
          d.attachments.len()
        )
      })
    }
  }
}

async fn attachments(
  client: &ApiClient,
  out: &Output,
  cmd: AttachmentCommand,
) -> Result<()> {
  match cmd {
    AttachmentCommand::List { entry } => {
      let list = client.list_attachments(EntryId(entry)).await?;
      out.show(list.as_slice(), render::attachments)
    }
    AttachmentCommand::Add { entry, file, name } => {
      let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
      let name = match name {
        Some(n) => n,
        None => file_name_of(&file)?,
      };
      let mime = detect_mime(&bytes);
      let attachment = client
        .upload_attachment(EntryId(entry), &name, mime, bytes)
        .await?;
      out.show(std::slice::from_ref(&attachment), render::attachments)
    }
    AttachmentCommand::Download { id, output } => {
      let id = AttachmentId(id);
      let target = match output {
        Some(path) => path,
        None => {
          let record = client.get_attachment(id).await?;
          PathBuf::from(file_name_of(Path::new(&record.file_name))?)
        }
      };
      let bytes = client.download_attachment(id).await?;
      tokio::fs::write(&target, &bytes)
        .await
        .with_context(|| format!("writing {}", target.display()))?;
      eprintln!("Wrote {} bytes to {}", bytes.len(), target.display());
      Ok(())
    }
    AttachmentCommand::Delete { id } => {
      let deleted = client.delete_attachment(AttachmentId(id)).await?;
      out.show(std::slice::from_ref(&deleted), render::attachments)
    }
  }
}

async fn import_eml(
  client: &ApiClient,
  out: &Output,
  thread: ThreadId,
  file: &Path,
  dry_run: bool,
) -> Result<()> {
  let bytes = tokio::fs::read(file)
    .await
    .with_context(|| format!("reading {}", file.display()))?;
  let email = client.parse_eml(&file_name_of(file)?, bytes).await?;

  let entry_date = email.date.unwrap_or_else(Utc::now).to_rfc3339();
  let title = (!email.subject.trim().is_empty()).then(|| email.subject.clone());
  let metadata = EntryMetadata::Email(email.into_metadata()).to_json()?;
  let body = json!({
    "thread_id": thread,
    "entry_type": EntryType::Email,
    "title": title,
    "entry_date": entry_date,
    "metadata": metadata,
  });

  if dry_run {
    println!("{}", serde_json::to_string_pretty(&body)?);
    return Ok(());
  }
  let entry = client.create_entry(&body).await?;
  out.show(std::slice::from_ref(&entry), render::entries)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_precedence_is_flag_then_file_then_default() {
    let file = ConfigFile { url: "http://ledger.lan:3001".into() };
    assert_eq!(resolve_url(Some("http://x".into()), &file), "http://x");
    assert_eq!(resolve_url(None, &file), "http://ledger.lan:3001");
    assert_eq!(resolve_url(None, &ConfigFile::default()), DEFAULT_URL);
  }

  #[test]
  fn search_accepts_repeated_types() {
    let args = Args::try_parse_from([
      "dialedger", "search", "budget", "--type", "note", "--type", "action_items",
    ])
    .unwrap();
    let Command::Search { entry_types, thread, .. } = args.command else {
      panic!("expected search");
    };
    assert_eq!(entry_types, vec![EntryType::Note, EntryType::ActionItems]);
    assert_eq!(thread, None);
  }

  #[test]
  fn unknown_entry_type_is_rejected_by_the_parser() {
    let err = Args::try_parse_from([
      "dialedger", "entries", "create", "1", "--type", "memo",
    ]);
    assert!(err.is_err());
  }

  #[test]
  fn patch_only_carries_changed_fields() {
    let fields = EntryFields { date: Some("2024-01-02T03:04".into()), ..Default::default() };
    let patch = entry_patch_body(fields, true, false);
    assert_eq!(patch, json!({ "title": null, "entry_date": "2024-01-02T03:04" }));
  }

  #[test]
  fn create_body_defaults_the_date() {
    let body = new_entry_body(4, EntryType::Note, EntryFields::default());
    assert_eq!(body["entry_type"], "note");
    assert_eq!(body["thread_id"], 4);
    assert!(body["entry_date"].as_str().is_some_and(|d| !d.is_empty()));
  }

  #[test]
  fn mime_comes_from_magic_bytes() {
    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    assert_eq!(detect_mime(&png), Some("image/png"));
    assert_eq!(detect_mime(b"%PDF-1.7\n"), Some("application/pdf"));
    assert_eq!(detect_mime(b"plain words"), None);
  }
}
