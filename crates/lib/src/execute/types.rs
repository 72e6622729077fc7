//! Executor errors and reports.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::host::HostError;
use crate::plan::Action;
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum ActionError {
  #[error(transparent)]
  Command(#[from] HostError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Service(#[from] ServiceError),

  /// The install directory holds something other than a checkout. Never deleted.
  #[error("{} exists and is not a git checkout; move it aside and re-run", .0.display())]
  RepositoryConflict(PathBuf),

  /// The runtime install commands succeeded but `node` is still too old or absent.
  #[error("node {found} is installed but v{required} or newer is required")]
  RuntimeTooOld { found: String, required: u32 },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: io::Error },
}

/// Outcome of executing a plan.
#[derive(Debug, Default)]
pub struct ExecutionReport {
  /// Actions that succeeded, in order.
  pub applied: Vec<Action>,
  /// Best-effort actions that failed; the run continued.
  pub warnings: Vec<(Action, ActionError)>,
  /// The hard failure that stopped the run.
  pub failed: Option<(Action, ActionError)>,
}

impl ExecutionReport {
  pub fn is_success(&self) -> bool {
    self.failed.is_none()
  }
}
