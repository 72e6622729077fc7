//! Probe, plan and execute in one place.
//!
//! The [`Engine`] owns the config store and borrows everything host-facing,
//! so the CLI and the integration tests drive exactly the same code.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::consts::{CONFIG_TEMPLATE_NAME, DEFAULT_NODE_MAJOR, DEFAULT_PORT, MANAGED_UNITS, MARKER_FILE, keys};
use crate::execute::{ExecutionReport, Executor};
use crate::host::{CommandRunner, CommandSpec};
use crate::plan::{DesiredConfig, Plan, plan, plan_uninstall};
use crate::platform::PlatformProfile;
use crate::probe::{HostState, ProbeRequest, Prober};
use crate::service::ServiceRegistrar;
use crate::service::units::{UnitSelection, managed_units};

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("refusing to delete {}: it is not a bridge checkout", .0.display())]
  NotACheckout(PathBuf),

  #[error("failed to delete {}: {source}", path.display())]
  RemoveDir { path: PathBuf, source: io::Error },
}

/// A plan and what happened when it ran.
#[derive(Debug)]
pub struct RunReport {
  pub plan: Plan,
  pub execution: ExecutionReport,
}

impl RunReport {
  pub fn is_success(&self) -> bool {
    self.execution.is_success()
  }
}

/// Result of the post-install syntax check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheck {
  Passed { entry: PathBuf },
  Failed { entry: PathBuf, reason: String },
  Skipped { reason: String },
}

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
  #[serde(default)]
  main: Option<String>,
}

pub struct Engine<'a> {
  profile: &'a PlatformProfile,
  runner: &'a dyn CommandRunner,
  registrar: &'a dyn ServiceRegistrar,
  store: ConfigStore,
}

impl<'a> Engine<'a> {
  pub fn new(profile: &'a PlatformProfile, runner: &'a dyn CommandRunner, registrar: &'a dyn ServiceRegistrar) -> Self {
    let store = ConfigStore::new(&profile.paths.config_file)
      .with_template(profile.paths.install_dir.join(CONFIG_TEMPLATE_NAME));
    Self {
      profile,
      runner,
      registrar,
      store,
    }
  }

  pub fn profile(&self) -> &PlatformProfile {
    self.profile
  }

  pub fn store(&self) -> &ConfigStore {
    &self.store
  }

  fn prober(&self) -> Prober<'_> {
    Prober::new(self.profile, self.runner, self.registrar, &self.store)
  }

  fn executor(&self) -> Executor<'_> {
    Executor::new(self.profile, self.runner, self.registrar, &self.store)
  }

  /// Probe the host against every unit the installer could manage.
  pub fn survey(&self) -> HostState {
    let port = self
      .store
      .get(keys::PORT)
      .ok()
      .flatten()
      .and_then(|p| p.parse().ok())
      .unwrap_or(DEFAULT_PORT);
    let selection = UnitSelection {
      agent: true,
      discovery: true,
      port,
    };
    self.prober().probe(&ProbeRequest {
      runtime_major: DEFAULT_NODE_MAJOR,
      packages: Vec::new(),
      units: managed_units(self.profile, &selection),
    })
  }

  pub fn probe(&self, desired: &DesiredConfig) -> HostState {
    self.prober().probe(&ProbeRequest::from(desired))
  }

  /// Probe and plan without touching the host.
  pub fn plan(&self, desired: &DesiredConfig) -> Plan {
    plan(&self.probe(desired), desired)
  }

  /// One probe, plan, execute cycle.
  pub fn reconcile(&self, desired: &DesiredConfig) -> RunReport {
    let plan = self.plan(desired);
    info!(changes = plan.change_count(), "planned");
    let execution = self.executor().execute_plan(&plan);
    RunReport { plan, execution }
  }

  /// Stop and remove every managed unit. Files are left in place.
  pub fn uninstall(&self) -> RunReport {
    let plan = plan_uninstall(&self.survey(), &MANAGED_UNITS);
    info!(changes = plan.change_count(), "planned uninstall");
    let execution = self.executor().execute_plan(&plan);
    RunReport { plan, execution }
  }

  /// Delete the install directory, but only if it holds a bridge checkout.
  pub fn remove_install_dir(&self) -> Result<bool, EngineError> {
    let dir = &self.profile.paths.install_dir;
    if !dir.exists() {
      return Ok(false);
    }
    if !dir.join(MARKER_FILE).is_file() && !dir.join(".git").exists() {
      return Err(EngineError::NotACheckout(dir.clone()));
    }
    fs::remove_dir_all(dir).map_err(|source| EngineError::RemoveDir {
      path: dir.clone(),
      source,
    })?;
    info!(path = %dir.display(), "install directory removed");
    Ok(true)
  }

  /// Syntax-check the bridge entry point with `node --check`.
  pub fn health_check(&self) -> HealthCheck {
    let dir = &self.profile.paths.install_dir;
    let entry = match entry_point(dir) {
      Ok(entry) => entry,
      Err(reason) => return HealthCheck::Skipped { reason },
    };
    if !entry.is_file() {
      return HealthCheck::Failed {
        reason: "entry point does not exist".to_string(),
        entry,
      };
    }

    let node = self.profile.paths.node_bin_dir.join("node");
    let spec = CommandSpec::new(node.to_string_lossy())
      .arg("--check")
      .arg(entry.to_string_lossy())
      .current_dir(dir);

    match self.runner.run(&spec) {
      Ok(output) if output.is_success() => {
        debug!(entry = %entry.display(), "health check passed");
        HealthCheck::Passed { entry }
      }
      Ok(output) => {
        let reason = output
          .stderr
          .lines()
          .find(|l| !l.trim().is_empty())
          .unwrap_or("node --check failed")
          .to_string();
        warn!(entry = %entry.display(), %reason, "health check failed");
        HealthCheck::Failed { entry, reason }
      }
      Err(e) => HealthCheck::Skipped {
        reason: format!("failed to run node: {}", e),
      },
    }
  }
}

/// The `main` entry of `package.json`, defaulting to `index.js`.
fn entry_point(dir: &Path) -> Result<PathBuf, String> {
  let manifest_path = dir.join(MARKER_FILE);
  let content = fs::read_to_string(&manifest_path).map_err(|e| format!("cannot read {}: {}", manifest_path.display(), e))?;
  let manifest: PackageManifest =
    serde_json::from_str(&content).map_err(|e| format!("invalid {}: {}", manifest_path.display(), e))?;
  Ok(dir.join(manifest.main.as_deref().unwrap_or("index.js")))
}
