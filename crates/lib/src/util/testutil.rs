//! Test doubles for the command runner and service registrar.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use crate::host::{CommandOutput, CommandRunner, CommandSpec, HostError};
use crate::platform::{
  Arch, Os, PackageManager, PathConventions, PlatformProfile, ServiceBackend, SystemdScope,
};
use crate::service::{RestartPolicy, ServiceError, ServiceRegistrar, ServiceStatus, ServiceUnit};

type Handler = Box<dyn Fn(&CommandSpec) -> io::Result<CommandOutput>>;

/// Records every command and answers with a caller-supplied handler.
pub struct RecordingRunner {
  handler: Handler,
  calls: RefCell<Vec<CommandSpec>>,
}

impl Default for RecordingRunner {
  fn default() -> Self {
    Self::new(|_| Ok(CommandOutput::success("")))
  }
}

impl RecordingRunner {
  pub fn new(handler: impl Fn(&CommandSpec) -> io::Result<CommandOutput> + 'static) -> Self {
    Self {
      handler: Box::new(handler),
      calls: RefCell::new(Vec::new()),
    }
  }

  /// Recorded commands, rendered as command lines.
  pub fn calls(&self) -> Vec<String> {
    self.calls.borrow().iter().map(ToString::to_string).collect()
  }

  pub fn specs(&self) -> Vec<CommandSpec> {
    self.calls.borrow().clone()
  }
}

impl CommandRunner for RecordingRunner {
  fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
    self.calls.borrow_mut().push(spec.clone());
    (self.handler)(spec)
  }
}

/// A unit with fixed, recognisable fields.
pub fn sample_unit(name: &str) -> ServiceUnit {
  let mut env_vars = BTreeMap::new();
  env_vars.insert("NODE_ENV".to_string(), "production".to_string());
  env_vars.insert("PATH".to_string(), "/usr/bin:/bin".to_string());

  ServiceUnit {
    name: name.to_string(),
    description: "CarClaw bridge".to_string(),
    executable_path: PathBuf::from("/usr/bin/npm"),
    args: vec!["start".to_string()],
    working_dir: PathBuf::from("/srv/bridge"),
    env_vars,
    restart_policy: RestartPolicy::OnFailure { delay_secs: 10 },
    log_path: PathBuf::from(format!("/var/log/clawup/{}.log", name)),
  }
}

/// A non-root Debian profile with every path under `root`.
pub fn linux_profile(root: &Path) -> PlatformProfile {
  let install_dir = root.join("bridge");
  PlatformProfile {
    os: Os::Linux,
    arch: Arch::X86_64,
    service_backend: ServiceBackend::Systemd(SystemdScope::User),
    package_manager: PackageManager::Apt,
    paths: PathConventions {
      config_file: install_dir.join(".env"),
      install_dir,
      unit_dir: root.join("units"),
      log_dir: root.join("logs"),
      node_bin_dir: PathBuf::from("/usr/bin"),
    },
    elevated: false,
    uid: 1000,
  }
}

/// In-memory service manager.
#[derive(Default)]
pub struct MemoryRegistrar {
  units: RefCell<BTreeMap<String, (String, ServiceStatus)>>,
  failing: RefCell<BTreeSet<String>>,
  calls: RefCell<Vec<String>>,
}

impl MemoryRegistrar {
  /// Pretend `unit` was registered earlier with `status`.
  pub fn install(&self, unit: &ServiceUnit, status: ServiceStatus) {
    self
      .units
      .borrow_mut()
      .insert(unit.name.clone(), (self.render(unit), status));
  }

  /// Replace the stored definition of an installed unit.
  pub fn set_definition(&self, name: &str, text: &str) {
    if let Some(entry) = self.units.borrow_mut().get_mut(name) {
      entry.0 = text.to_string();
    }
  }

  /// Make every operation on `name` fail.
  pub fn fail(&self, name: &str) {
    self.failing.borrow_mut().insert(name.to_string());
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.borrow().clone()
  }

  fn record(&self, op: &str, name: &str) -> Result<(), ServiceError> {
    self.calls.borrow_mut().push(format!("{} {}", op, name));
    if self.failing.borrow().contains(name) {
      return Err(ServiceError::Command(HostError::Failed {
        command: format!("{} {}", op, name),
        code: Some(1),
        stderr: "simulated failure".to_string(),
      }));
    }
    Ok(())
  }

  fn set_status(&self, name: &str, status: ServiceStatus) -> Result<(), ServiceError> {
    match self.units.borrow_mut().get_mut(name) {
      Some(entry) => {
        entry.1 = status;
        Ok(())
      }
      None => Err(ServiceError::Command(HostError::Failed {
        command: format!("start {}", name),
        code: Some(5),
        stderr: "unit not found".to_string(),
      })),
    }
  }
}

impl ServiceRegistrar for MemoryRegistrar {
  fn backend(&self) -> ServiceBackend {
    ServiceBackend::Systemd(SystemdScope::User)
  }

  fn render(&self, unit: &ServiceUnit) -> String {
    format!("{:?}", unit)
  }

  fn create(&self, unit: &ServiceUnit) -> Result<(), ServiceError> {
    self.record("create", &unit.name)?;
    self
      .units
      .borrow_mut()
      .insert(unit.name.clone(), (self.render(unit), ServiceStatus::Stopped));
    Ok(())
  }

  fn remove(&self, name: &str) -> Result<(), ServiceError> {
    self.record("remove", name)?;
    self.units.borrow_mut().remove(name);
    Ok(())
  }

  fn start(&self, name: &str) -> Result<(), ServiceError> {
    self.record("start", name)?;
    self.set_status(name, ServiceStatus::Running)
  }

  fn stop(&self, name: &str) -> Result<(), ServiceError> {
    self.record("stop", name)?;
    if let Some(entry) = self.units.borrow_mut().get_mut(name) {
      entry.1 = ServiceStatus::Stopped;
    }
    Ok(())
  }

  fn restart(&self, name: &str) -> Result<(), ServiceError> {
    self.record("restart", name)?;
    self.set_status(name, ServiceStatus::Running)
  }

  fn status(&self, name: &str) -> ServiceStatus {
    self
      .units
      .borrow()
      .get(name)
      .map(|(_, status)| *status)
      .unwrap_or(ServiceStatus::Stopped)
  }

  fn is_registered(&self, name: &str) -> Result<bool, ServiceError> {
    Ok(self.units.borrow().contains_key(name))
  }

  fn definition(&self, name: &str) -> Result<Option<String>, ServiceError> {
    Ok(self.units.borrow().get(name).map(|(text, _)| text.clone()))
  }
}
