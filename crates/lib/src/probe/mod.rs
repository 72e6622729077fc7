//! State Prober.
//!
//! Inspects the host and reports a [`HostState`]. Every check is read-only:
//! file metadata, `node --version`, package-manager queries, the parsed
//! config document and service-manager status. A check that cannot decide
//! reports [`ResourceState::Unknown`] instead of failing the run.

mod types;

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::config::ConfigStore;
use crate::consts::MARKER_FILE;
use crate::host::{CommandRunner, CommandSpec};
use crate::platform::PlatformProfile;
use crate::service::{ServiceRegistrar, ServiceStatus, ServiceUnit};

pub use types::{HostState, ProbeRequest, Resource, ResourceState, ServiceState};

pub struct Prober<'a> {
  profile: &'a PlatformProfile,
  runner: &'a dyn CommandRunner,
  registrar: &'a dyn ServiceRegistrar,
  store: &'a ConfigStore,
}

impl<'a> Prober<'a> {
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

  pub fn probe(&self, request: &ProbeRequest) -> HostState {
    let mut state = HostState::default();
    let install_dir = &self.profile.paths.install_dir;

    state
      .resources
      .insert(Resource::Runtime, self.probe_runtime(request.runtime_major));
    if !request.packages.is_empty() {
      state
        .resources
        .insert(Resource::Packages, self.probe_packages(&request.packages));
    }
    state.resources.insert(Resource::Repository, probe_repository(install_dir));
    state
      .resources
      .insert(Resource::Dependencies, probe_dependencies(install_dir));

    match self.store.load() {
      Ok(doc) => {
        for (key, value) in doc.entries() {
          state
            .resources
            .insert(Resource::ConfigKey(key.to_string()), ResourceState::Present(value.to_string()));
        }
      }
      Err(e) => debug!(error = %e, "config unreadable, treating all keys as absent"),
    }

    for unit in &request.units {
      state.services.insert(unit.name.clone(), self.probe_service(unit));
    }

    for (resource, resource_state) in &state.resources {
      if !matches!(resource, Resource::ConfigKey(_)) {
        debug!(%resource, state = %resource_state, "probed");
      }
    }
    for (name, service_state) in &state.services {
      debug!(unit = %name, state = %service_state, "probed");
    }

    state
  }

  fn probe_runtime(&self, min_major: u32) -> ResourceState {
    let node = self.profile.paths.node_bin_dir.join("node");
    let spec = CommandSpec::new(node.to_string_lossy()).arg("--version");

    let output = match self.runner.run(&spec) {
      Ok(output) => output,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return ResourceState::Missing,
      Err(e) => return ResourceState::Unknown(format!("failed to run node: {}", e)),
    };
    if !output.is_success() {
      return ResourceState::Unknown(format!("node --version exited with {:?}", output.code));
    }

    let version = output.stdout.trim();
    match parse_node_major(version) {
      Some(major) if major >= min_major => ResourceState::Present(version.to_string()),
      Some(_) => ResourceState::Misconfigured(format!("{} is older than v{}", version, min_major)),
      None => ResourceState::Unknown(format!("unrecognised node version {:?}", version)),
    }
  }

  fn probe_packages(&self, packages: &[String]) -> ResourceState {
    let manager = self.profile.package_manager;
    let mut missing = Vec::new();

    for package in packages {
      match self.runner.run(&manager.package_query(package)) {
        Ok(output) if output.is_success() && manager.query_reports_installed(&output.stdout) => {}
        Ok(_) => missing.push(package.as_str()),
        Err(e) => return ResourceState::Unknown(format!("{} query failed: {}", manager, e)),
      }
    }

    if missing.is_empty() {
      ResourceState::Present(packages.join(" "))
    } else {
      debug!(packages = ?missing, "packages not installed");
      ResourceState::Missing
    }
  }

  fn probe_service(&self, unit: &ServiceUnit) -> ServiceState {
    let name = unit.name.as_str();
    match self.registrar.is_registered(name) {
      Ok(false) => return ServiceState::Unregistered,
      Ok(true) => {}
      Err(e) => {
        debug!(unit = name, error = %e, "registration check failed");
        return ServiceState::Unknown;
      }
    }

    let drifted = match self.registrar.definition(name) {
      Ok(Some(installed)) => installed != self.registrar.render(unit),
      Ok(None) => true,
      Err(e) => {
        debug!(unit = name, error = %e, "unit definition unreadable");
        true
      }
    };

    match self.registrar.status(name) {
      ServiceStatus::Running => ServiceState::Running { drifted },
      ServiceStatus::Stopped => ServiceState::Stopped { drifted },
      ServiceStatus::Unknown => ServiceState::Unknown,
    }
  }
}

/// A checkout counts when both `.git` and the marker file exist.
fn probe_repository(dir: &Path) -> ResourceState {
  match fs::metadata(dir) {
    Ok(meta) if !meta.is_dir() => return ResourceState::Misconfigured("not a directory".to_string()),
    Ok(_) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => return ResourceState::Missing,
    Err(e) => return ResourceState::Unknown(e.to_string()),
  }

  if dir.join(".git").exists() && dir.join(MARKER_FILE).is_file() {
    return ResourceState::Present(dir.display().to_string());
  }

  match fs::read_dir(dir) {
    Ok(mut entries) => {
      if entries.next().is_none() {
        ResourceState::Missing
      } else {
        ResourceState::Misconfigured(format!("{} is not a bridge checkout", dir.display()))
      }
    }
    Err(e) => ResourceState::Unknown(e.to_string()),
  }
}

fn probe_dependencies(dir: &Path) -> ResourceState {
  let modules = dir.join("node_modules");
  if modules.is_dir() {
    ResourceState::Present(modules.display().to_string())
  } else {
    ResourceState::Missing
  }
}

/// Major version from `node --version` output such as `v20.11.1`.
pub(crate) fn parse_node_major(version: &str) -> Option<u32> {
  version.trim().strip_prefix('v')?.split('.').next()?.parse().ok()
}
