//! Background service registration.
//!
//! A [`ServiceUnit`] describes what to run; a [`ServiceRegistrar`] turns it
//! into a platform unit (systemd unit file or launchd property list) and
//! drives the service manager. The registrar is picked once from the
//! [`PlatformProfile`].
//!
//! Lifecycle per unit:
//!
//! ```text
//! Unregistered --create--> Registered --start--> Running
//!      ^                      |  ^                  |
//!      +-------remove---------+  +------stop--------+
//! ```
//!
//! `remove` expects a stopped unit; the executor always stops first.

mod launchd;
mod systemd;
pub mod units;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::host::{CommandRunner, HostError};
use crate::platform::{PlatformProfile, ServiceBackend};

pub use launchd::LaunchdRegistrar;
pub use systemd::SystemdRegistrar;

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("failed to write unit {}: {source}", path.display())]
  WriteUnit { path: PathBuf, source: io::Error },

  #[error("failed to read unit {}: {source}", path.display())]
  ReadUnit { path: PathBuf, source: io::Error },

  #[error("failed to remove unit {}: {source}", path.display())]
  RemoveUnit { path: PathBuf, source: io::Error },

  #[error("service manager command failed: {0}")]
  Command(#[from] HostError),
}

/// How the service manager reacts when the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
  /// Restart only after a non-zero exit, waiting `delay_secs`.
  OnFailure { delay_secs: u32 },
  /// Restart after any exit, waiting `delay_secs`.
  Always { delay_secs: u32 },
}

impl RestartPolicy {
  pub fn delay_secs(&self) -> u32 {
    match self {
      Self::OnFailure { delay_secs } | Self::Always { delay_secs } => *delay_secs,
    }
  }
}

/// Platform-neutral description of a background service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
  pub name: String,
  pub description: String,
  pub executable_path: PathBuf,
  pub args: Vec<String>,
  pub working_dir: PathBuf,
  pub env_vars: BTreeMap<String, String>,
  pub restart_policy: RestartPolicy,
  /// File receiving both stdout and stderr.
  pub log_path: PathBuf,
}

/// Runtime status reported by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
  Running,
  Stopped,
  Unknown,
}

impl fmt::Display for ServiceStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Running => "running",
      Self::Stopped => "stopped",
      Self::Unknown => "unknown",
    };
    write!(f, "{}", s)
  }
}

/// Uniform contract over systemd and launchd.
pub trait ServiceRegistrar {
  fn backend(&self) -> ServiceBackend;

  /// Backend-specific unit text for `unit`.
  fn render(&self, unit: &ServiceUnit) -> String;

  /// Write and enable the unit. Does not start it.
  fn create(&self, unit: &ServiceUnit) -> Result<(), ServiceError>;

  /// Disable and delete the unit. The unit must already be stopped.
  fn remove(&self, name: &str) -> Result<(), ServiceError>;

  fn start(&self, name: &str) -> Result<(), ServiceError>;

  /// Stop the unit; succeeds when it is already stopped.
  fn stop(&self, name: &str) -> Result<(), ServiceError>;

  fn restart(&self, name: &str) -> Result<(), ServiceError>;

  fn status(&self, name: &str) -> ServiceStatus;

  fn is_registered(&self, name: &str) -> Result<bool, ServiceError>;

  /// Unit text currently installed for `name`, if any.
  fn definition(&self, name: &str) -> Result<Option<String>, ServiceError>;
}

/// Select the registrar for the profile's service backend.
pub fn registrar_for<'a>(profile: &PlatformProfile, runner: &'a dyn CommandRunner) -> Box<dyn ServiceRegistrar + 'a> {
  match profile.service_backend {
    ServiceBackend::Systemd(scope) => Box::new(SystemdRegistrar::new(scope, profile.paths.unit_dir.clone(), runner)),
    ServiceBackend::Launchd => Box::new(LaunchdRegistrar::new(profile.uid, profile.paths.unit_dir.clone(), runner)),
  }
}

fn read_definition(path: &std::path::Path) -> Result<Option<String>, ServiceError> {
  match std::fs::read_to_string(path) {
    Ok(content) => Ok(Some(content)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(ServiceError::ReadUnit {
      path: path.to_path_buf(),
      source,
    }),
  }
}

fn write_definition(path: &std::path::Path, content: &str) -> Result<(), ServiceError> {
  let write_err = |source| ServiceError::WriteUnit {
    path: path.to_path_buf(),
    source,
  };
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(write_err)?;
  }
  std::fs::write(path, content).map_err(write_err)
}

fn remove_definition(path: &std::path::Path) -> Result<(), ServiceError> {
  match std::fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(ServiceError::RemoveUnit {
      path: path.to_path_buf(),
      source,
    }),
  }
}
