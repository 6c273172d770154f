//! Managed storage for attachment bytes.
//!
//! Every attachment row points at a copy inside [`FileStore::root`]; the
//! original upload (usually a temp file) is never referenced. Copies are
//! named `<unix-millis>_<sanitised name>`, with a numeric suffix when two
//! uploads land in the same millisecond.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use chrono::Utc;
use tokio::{fs, io::AsyncWriteExt as _};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::FileError;

type Result<T, E = FileError> = std::result::Result<T, E>;

const STAGING_DIR: &str = ".incoming";

#[derive(Debug, Clone)]
pub struct FileStore {
  root: PathBuf,
}

impl FileStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Create the managed directory and its staging area.
  pub async fn ensure_root(&self) -> Result<()> {
    let staging = self.root.join(STAGING_DIR);
    fs::create_dir_all(&staging)
      .await
      .map_err(|e| FileError::io(&staging, e))
  }

  /// Copy `source` into managed storage and return the new path.
  ///
  /// Only the final component of `original_name` is used.
  pub async fn copy_in(
    &self,
    source: &Path,
    original_name: &str,
  ) -> Result<PathBuf> {
    if !fs::try_exists(source).await.map_err(|e| FileError::io(source, e))? {
      return Err(FileError::missing(source));
    }
    self.ensure_root().await?;

    let name = sanitize_file_name(original_name);
    let millis = Utc::now().timestamp_millis();
    let mut suffix = 0u32;
    let target = loop {
      let candidate = match suffix {
        0 => self.root.join(format!("{millis}_{name}")),
        n => self.root.join(format!("{millis}_{n}_{name}")),
      };
      // Reserve the name atomically so concurrent uploads cannot collide.
      match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&candidate)
        .await
      {
        Ok(_) => break candidate,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
        Err(e) => return Err(FileError::io(&candidate, e)),
      }
    };

    if let Err(e) = fs::copy(source, &target).await {
      let _ = fs::remove_file(&target).await;
      return Err(FileError::io(source, e));
    }
    debug!(from = %source.display(), to = %target.display(), "copied file into storage");
    Ok(target)
  }

  /// Write an uploaded body to a fresh staging file.
  pub async fn stage_upload(&self, bytes: &[u8]) -> Result<PathBuf> {
    self.ensure_root().await?;
    let path = self.root.join(STAGING_DIR).join(Uuid::new_v4().to_string());
    let mut file = fs::File::create(&path)
      .await
      .map_err(|e| FileError::io(&path, e))?;
    file.write_all(bytes).await.map_err(|e| FileError::io(&path, e))?;
    file.flush().await.map_err(|e| FileError::io(&path, e))?;
    Ok(path)
  }

  /// Remove `path`. Returns `false` when it was already gone.
  pub async fn delete_if_exists(&self, path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
      Ok(()) => {
        debug!(path = %path.display(), "deleted file");
        Ok(true)
      }
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
      Err(e) => {
        warn!(path = %path.display(), error = %e, "failed to delete file");
        Err(FileError::io(path, e))
      }
    }
  }

  pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
    match fs::read(path).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == ErrorKind::NotFound => Err(FileError::missing(path)),
      Err(e) => Err(FileError::io(path, e)),
    }
  }
}

/// The last path component of `name` with anything outside
/// `[A-Za-z0-9._ -]` replaced by `_`.
pub fn sanitize_file_name(name: &str) -> String {
  let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
  let clean: String = last
    .chars()
    .map(|c| match c {
      'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' | ' ' => c,
      _ => '_',
    })
    .collect();
  let clean = clean.trim().trim_start_matches('.');
  if clean.is_empty() { "file".to_owned() } else { clean.to_owned() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitize_keeps_only_the_final_component() {
    assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
    assert_eq!(sanitize_file_name(r"C:\Users\me\notes.txt"), "notes.txt");
    assert_eq!(sanitize_file_name("résumé (1).pdf"), "r_sum_ _1_.pdf");
    assert_eq!(sanitize_file_name(".."), "file");
    assert_eq!(sanitize_file_name(""), "file");
  }

  #[tokio::test]
  async fn copy_in_never_reuses_a_name() {
    let dir = tempfile::tempdir().unwrap();
    let files = FileStore::new(dir.path().join("attachments"));
    let source = dir.path().join("upload.tmp");
    tokio::fs::write(&source, b"contents").await.unwrap();

    let a = files.copy_in(&source, "report.pdf").await.unwrap();
    let b = files.copy_in(&source, "report.pdf").await.unwrap();

    assert_ne!(a, b);
    assert!(a.starts_with(files.root()));
    assert!(a.file_name().unwrap().to_str().unwrap().ends_with("_report.pdf"));
    assert_eq!(files.read(&b).await.unwrap(), b"contents");
    // The source is left alone.
    assert!(source.exists());
  }

  #[tokio::test]
  async fn copy_in_missing_source_is_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let files = FileStore::new(dir.path());
    let err = files
      .copy_in(&dir.path().join("nope"), "nope.txt")
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      FileError::Core(dialedger_core::Error::PhysicalFileMissing { .. })
    ));
  }

  #[tokio::test]
  async fn delete_if_exists_tolerates_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let files = FileStore::new(dir.path());
    let staged = files.stage_upload(b"x").await.unwrap();
    assert!(staged.starts_with(dir.path().join(STAGING_DIR)));

    assert!(files.delete_if_exists(&staged).await.unwrap());
    assert!(!files.delete_if_exists(&staged).await.unwrap());
  }

  #[tokio::test]
  async fn read_of_missing_file_is_classified() {
    use dialedger_core::{Classify, ErrorKind};

    let dir = tempfile::tempdir().unwrap();
    let files = FileStore::new(dir.path());
    let err = files.read(&dir.path().join("gone.bin")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PhysicalFileMissing);
  }
}
