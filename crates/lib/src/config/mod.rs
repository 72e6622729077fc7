//! Persisted bridge configuration (`.env`).
//!
//! The store parses the file into a [`ConfigDocument`] and rewrites it
//! atomically on every [`ConfigStore::set`]. There is no locking: the
//! installer is a single foreground run.

mod document;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

pub use document::ConfigDocument;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to write config {}: {source}", path.display())]
  Write { path: PathBuf, source: io::Error },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: io::Error },
}

/// Read/patch/rewrite access to the bridge's `.env` file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
  path: PathBuf,
  template: Option<PathBuf>,
}

impl ConfigStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      template: None,
    }
  }

  /// Use `template` as the initial content when the file is first created.
  pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
    self.template = Some(template.into());
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.is_file()
  }

  /// Load the current document; a missing file is an empty document.
  pub fn load(&self) -> Result<ConfigDocument, ConfigError> {
    match fs::read_to_string(&self.path) {
      Ok(content) => Ok(ConfigDocument::parse(&content)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ConfigDocument::new()),
      Err(source) => Err(ConfigError::Read {
        path: self.path.clone(),
        source,
      }),
    }
  }

  pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
    Ok(self.load()?.get(key).map(str::to_string))
  }

  /// Create the file if absent, from the template when one exists.
  ///
  /// Returns `true` when the file was created by this call.
  pub fn ensure_exists(&self) -> Result<bool, ConfigError> {
    if self.exists() {
      return Ok(false);
    }

    let initial = match &self.template {
      Some(template) if template.is_file() => fs::read_to_string(template).map_err(|source| ConfigError::Read {
        path: template.clone(),
        source,
      })?,
      _ => String::new(),
    };

    self.write(&initial)?;
    info!(path = %self.path.display(), "created config file");
    Ok(true)
  }

  /// Upsert one key, leaving every other line of the file untouched.
  ///
  /// The file is re-read first so edits made between runs are kept.
  pub fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
    let mut doc = self.load()?;
    if doc.get(key) == Some(value) {
      debug!(key, "config value unchanged");
      return Ok(());
    }
    doc.set(key, value);
    self.write(&doc.to_string())?;
    debug!(key, path = %self.path.display(), "config value written");
    Ok(())
  }

  /// Atomically replace the file contents (temp file in the same directory, then rename).
  fn write(&self, content: &str) -> Result<(), ConfigError> {
    let dir = match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
      path: dir.clone(),
      source,
    })?;

    let write_err = |source| ConfigError::Write {
      path: self.path.clone(),
      source,
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    restrict_permissions(tmp.as_file()).map_err(write_err)?;
    tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
    Ok(())
  }
}

/// Secrets live in this file; keep it owner-only.
#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> io::Result<()> {
  Ok(())
}
