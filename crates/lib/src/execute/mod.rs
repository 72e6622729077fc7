//! Action Executor.
//!
//! Applies planned actions strictly in order. Every action is safe to run
//! twice: clones become fast-forward pulls, config writes touch one key,
//! registration replaces an existing unit.

mod types;

use std::fs;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::config::ConfigStore;
use crate::host::{CommandRunner, CommandSpec, run_checked};
use crate::platform::PlatformProfile;
use crate::plan::{Action, Plan};
use crate::probe::parse_node_major;
use crate::service::{ServiceRegistrar, ServiceUnit};

pub use types::{ActionError, ExecutionReport};

pub struct Executor<'a> {
  profile: &'a PlatformProfile,
  runner: &'a dyn CommandRunner,
  registrar: &'a dyn ServiceRegistrar,
  store: &'a ConfigStore,
}

impl<'a> Executor<'a> {
  pub fn new(
    profile: &'a PlatformProfile,
    runner: &'a dyn CommandRunner,
    registrar: &'a dyn ServiceRegistrar,
    store: &'a ConfigStore,
  ) -> Self {
    Self {
      profile,
      runner,
      registrar,
      store,
    }
  }

  /// Apply `plan`, stopping at the first hard failure.
  pub fn execute_plan(&self, plan: &Plan) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for action in &plan.actions {
      if action.is_noop() {
        debug!(%action, "skipping");
        continue;
      }

      info!(%action, "applying");
      match self.execute(action) {
        Ok(()) => report.applied.push(action.clone()),
        Err(e) if action.is_best_effort() => {
          warn!(%action, error = %e, "best-effort action failed, continuing");
          report.warnings.push((action.clone(), e));
        }
        Err(e) => {
          error!(%action, error = %e, "action failed");
          report.failed = Some((action.clone(), e));
          break;
        }
      }
    }

    report
  }

  pub fn execute(&self, action: &Action) -> Result<(), ActionError> {
    let elevated = self.profile.elevated;
    let manager = self.profile.package_manager;

    match action {
      Action::InstallRuntime { major } => {
        self.run_all(&manager.runtime_install(*major, elevated))?;
        self.verify_runtime(*major)
      }
      Action::InstallPackages(packages) => self.run_all(&manager.package_install(packages, elevated)),
      Action::CloneOrUpdateRepo { url, dest } => self.clone_or_update(url, dest),
      Action::InstallDependencies => self.install_dependencies(),
      Action::SetConfigValue { key, value } => {
        self.store.ensure_exists()?;
        self.store.set(key, value)?;
        Ok(())
      }
      Action::StopService(name) => Ok(self.registrar.stop(name)?),
      Action::RegisterService(unit) => self.register(unit),
      Action::StartService(name) => Ok(self.registrar.start(name)?),
      Action::RestartService(name) => Ok(self.registrar.restart(name)?),
      Action::RemoveService(name) => Ok(self.registrar.remove(name)?),
      Action::Noop(_) => Ok(()),
    }
  }

  fn run_all(&self, specs: &[CommandSpec]) -> Result<(), ActionError> {
    for spec in specs {
      run_checked(self.runner, spec)?;
    }
    Ok(())
  }

  fn verify_runtime(&self, required: u32) -> Result<(), ActionError> {
    let node = self.profile.paths.node_bin_dir.join("node");
    let found = run_checked(self.runner, &CommandSpec::new(node.to_string_lossy()).arg("--version"))?;
    match parse_node_major(&found) {
      Some(major) if major >= required => {
        debug!(version = %found, "runtime verified");
        Ok(())
      }
      _ => Err(ActionError::RuntimeTooOld { found, required }),
    }
  }

  fn clone_or_update(&self, url: &str, dest: &Path) -> Result<(), ActionError> {
    let dest_str = dest.to_string_lossy().into_owned();

    if dest.join(".git").exists() {
      debug!(dest = %dest.display(), "checkout exists, fast-forwarding");
      run_checked(
        self.runner,
        &CommandSpec::new("git").args(["-C", dest_str.as_str(), "pull", "--ff-only"]),
      )?;
      return Ok(());
    }

    if !is_empty_or_absent(dest) {
      return Err(ActionError::RepositoryConflict(dest.to_path_buf()));
    }

    if let Some(parent) = dest.parent() {
      create_dir(parent)?;
    }
    run_checked(self.runner, &CommandSpec::new("git").args(["clone", url, dest_str.as_str()]))?;
    Ok(())
  }

  fn install_dependencies(&self) -> Result<(), ActionError> {
    let dir = &self.profile.paths.install_dir;
    let npm = self.profile.paths.node_bin_dir.join("npm");
    let subcommand = if dir.join("package-lock.json").is_file() {
      "ci"
    } else {
      "install"
    };

    run_checked(
      self.runner,
      &CommandSpec::new(npm.to_string_lossy()).arg(subcommand).current_dir(dir),
    )?;
    Ok(())
  }

  fn register(&self, unit: &ServiceUnit) -> Result<(), ActionError> {
    if let Some(log_dir) = unit.log_path.parent() {
      create_dir(log_dir)?;
    }
    if self.registrar.is_registered(&unit.name)? {
      debug!(unit = %unit.name, "replacing registered unit");
      self.registrar.remove(&unit.name)?;
    }
    self.registrar.create(unit)?;
    Ok(())
  }
}

fn is_empty_or_absent(dir: &Path) -> bool {
  match fs::read_dir(dir) {
    Ok(mut entries) => entries.next().is_none(),
    Err(_) => !dir.exists(),
  }
}

fn create_dir(path: &Path) -> Result<(), ActionError> {
  fs::create_dir_all(path).map_err(|source| ActionError::CreateDir {
    path: path.to_path_buf(),
    source,
  })
}
