//! Simulated host shared by the integration tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clawup_lib::consts::keys;
use clawup_lib::credentials::{CredentialError, CredentialValidator, Validation};
use clawup_lib::host::{CommandOutput, CommandRunner, CommandSpec, HostError};
use clawup_lib::plan::{DesiredConfig, OptionalService};
use clawup_lib::platform::{Arch, Os, PackageManager, PathConventions, PlatformProfile, ServiceBackend, SystemdScope};
use clawup_lib::service::{ServiceError, ServiceRegistrar, ServiceStatus, ServiceUnit};
use clawup_lib::service::units::bridge_unit;
use tempfile::TempDir;

pub const REPO_URL: &str = "https://example.com/carclaw-bridge.git";

/// Files a fresh clone of the bridge contains.
pub const TEMPLATE: &str = "# CarClaw bridge\nAGENTS=\nLOG_LEVEL=info\n";

/// Tempdir-backed host: a Debian user profile whose paths live under `root`.
pub struct TestHost {
  pub temp: TempDir,
  pub profile: PlatformProfile,
  pub runner: FakeRunner,
  pub registrar: MemoryRegistrar,
}

impl TestHost {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let install_dir = root.join("bridge");
    let profile = PlatformProfile {
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
    };
    Self {
      temp,
      profile,
      runner: FakeRunner::default(),
      registrar: MemoryRegistrar::default(),
    }
  }

  pub fn install_dir(&self) -> &Path {
    &self.profile.paths.install_dir
  }

  pub fn config_text(&self) -> String {
    fs::read_to_string(&self.profile.paths.config_file).unwrap()
  }

  /// The smallest desired state: bridge unit and agent roster.
  pub fn minimal_desired(&self) -> DesiredConfig {
    let mut desired = DesiredConfig::new(REPO_URL, self.install_dir());
    desired.set_value(keys::AGENTS, "mini:Mini,m5:M5");
    desired.units = vec![bridge_unit(&self.profile)];
    desired
  }

  /// Pretend an earlier run already cloned the bridge.
  pub fn seed_checkout(&self, env: &str) {
    clone_into(self.install_dir());
    fs::create_dir_all(self.install_dir().join("node_modules")).unwrap();
    fs::write(&self.profile.paths.config_file, env).unwrap();
  }
}

fn clone_into(dest: &Path) {
  fs::create_dir_all(dest.join(".git")).unwrap();
  fs::write(dest.join("package.json"), r#"{"name": "carclaw-bridge", "main": "index.js"}"#).unwrap();
  fs::write(dest.join("index.js"), "require('./server')\n").unwrap();
  fs::write(dest.join(".env.example"), TEMPLATE).unwrap();
}

#[derive(Default)]
struct FakeState {
  node: Option<String>,
  packages: BTreeSet<String>,
  failing: BTreeSet<String>,
  commands: Vec<String>,
}

/// Command runner that simulates node, apt, git and npm.
#[derive(Default)]
pub struct FakeRunner {
  state: RefCell<FakeState>,
}

impl FakeRunner {
  pub fn with_node(&self, version: &str) {
    self.state.borrow_mut().node = Some(version.to_string());
  }

  /// Make every command whose line contains `needle` exit non-zero.
  pub fn fail_on(&self, needle: &str) {
    self.state.borrow_mut().failing.insert(needle.to_string());
  }

  pub fn heal(&self) {
    self.state.borrow_mut().failing.clear();
  }

  pub fn commands(&self) -> Vec<String> {
    self.state.borrow().commands.clone()
  }

  /// Commands other than read-only queries.
  pub fn mutating_commands(&self) -> Vec<String> {
    self
      .commands()
      .into_iter()
      .filter(|c| !c.contains("--version") && !c.starts_with("dpkg-query") && !c.contains("--check"))
      .collect()
  }
}

impl CommandRunner for FakeRunner {
  fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
    let line = spec.to_string();
    let mut state = self.state.borrow_mut();
    state.commands.push(line.clone());

    if state.failing.iter().any(|needle| line.contains(needle.as_str())) {
      return Ok(CommandOutput::failure(1, format!("simulated failure: {}", line)));
    }

    let mut args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
    let mut program = spec.program.as_str();
    if program == "sudo" {
      args.retain(|a| *a != "-E");
      program = args.remove(0);
    }
    let program = program.rsplit('/').next().unwrap_or(program);

    match (program, args.as_slice()) {
      ("node", ["--version"]) => match &state.node {
        Some(version) => Ok(CommandOutput::success(format!("{}\n", version))),
        None => Err(io::Error::from(io::ErrorKind::NotFound)),
      },
      ("apt-get", ["install", "-y", packages @ ..]) => {
        for package in packages {
          if *package == "nodejs" {
            state.node = Some("v20.11.1".to_string());
          } else {
            state.packages.insert(package.to_string());
          }
        }
        Ok(CommandOutput::success(""))
      }
      ("dpkg-query", [.., package]) => {
        if state.packages.contains(*package) {
          Ok(CommandOutput::success("install ok installed"))
        } else {
          Ok(CommandOutput::failure(1, format!("dpkg-query: no packages found matching {}", package)))
        }
      }
      ("git", ["clone", _, dest]) => {
        clone_into(Path::new(dest));
        Ok(CommandOutput::success(""))
      }
      ("npm", ["install" | "ci"]) => {
        if let Some(cwd) = &spec.cwd {
          fs::create_dir_all(cwd.join("node_modules"))?;
        }
        Ok(CommandOutput::success(""))
      }
      _ => Ok(CommandOutput::success("")),
    }
  }
}

/// In-memory service manager recording lifecycle calls.
#[derive(Default)]
pub struct MemoryRegistrar {
  units: RefCell<BTreeMap<String, (String, ServiceStatus)>>,
  calls: RefCell<Vec<String>>,
}

impl MemoryRegistrar {
  pub fn install(&self, unit: &ServiceUnit, status: ServiceStatus) {
    self
      .units
      .borrow_mut()
      .insert(unit.name.clone(), (self.render(unit), status));
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.borrow().clone()
  }

  pub fn clear_calls(&self) {
    self.calls.borrow_mut().clear();
  }

  fn record(&self, op: &str, name: &str) {
    self.calls.borrow_mut().push(format!("{} {}", op, name));
  }

  fn transition(&self, name: &str, status: ServiceStatus) -> Result<(), ServiceError> {
    match self.units.borrow_mut().get_mut(name) {
      Some(entry) => {
        entry.1 = status;
        Ok(())
      }
      None => Err(ServiceError::Command(HostError::Failed {
        command: format!("systemctl --user start {}", name),
        code: Some(5),
        stderr: format!("Unit {}.service not found.", name),
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
    self.record("create", &unit.name);
    let mut units = self.units.borrow_mut();
    assert!(!units.contains_key(&unit.name), "create over a registered unit");
    units.insert(unit.name.clone(), (self.render(unit), ServiceStatus::Stopped));
    Ok(())
  }

  fn remove(&self, name: &str) -> Result<(), ServiceError> {
    self.record("remove", name);
    let mut units = self.units.borrow_mut();
    if let Some((_, status)) = units.get(name) {
      assert_ne!(*status, ServiceStatus::Running, "remove of a running unit");
    }
    units.remove(name);
    Ok(())
  }

  fn start(&self, name: &str) -> Result<(), ServiceError> {
    self.record("start", name);
    self.transition(name, ServiceStatus::Running)
  }

  fn stop(&self, name: &str) -> Result<(), ServiceError> {
    self.record("stop", name);
    if let Some(entry) = self.units.borrow_mut().get_mut(name) {
      entry.1 = ServiceStatus::Stopped;
    }
    Ok(())
  }

  fn restart(&self, name: &str) -> Result<(), ServiceError> {
    self.record("restart", name);
    self.transition(name, ServiceStatus::Running)
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

/// Accepts tokens starting with `good-`, rejects everything else.
#[derive(Default)]
pub struct StubValidator {
  pub checked: RefCell<Vec<OptionalService>>,
}

impl CredentialValidator for StubValidator {
  fn validate(&self, service: OptionalService, token: &str) -> Result<Validation, CredentialError> {
    self.checked.borrow_mut().push(service);
    if token.starts_with("good-") {
      Ok(Validation::Accepted {
        identity: format!("{}-bot", service.as_str().to_lowercase()),
      })
    } else {
      Ok(Validation::Rejected {
        reason: "Unauthorized".to_string(),
      })
    }
  }
}
