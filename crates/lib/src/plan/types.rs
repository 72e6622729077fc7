//! Desired configuration, actions and plans.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use crate::consts::{DEFAULT_NODE_MAJOR, is_secret_key, keys};
use crate::probe::{ProbeRequest, Resource};
use crate::service::ServiceUnit;

/// Messaging integrations the user may opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionalService {
  Telegram,
  Discord,
  Slack,
}

impl OptionalService {
  pub const ALL: [OptionalService; 3] = [Self::Telegram, Self::Discord, Self::Slack];

  /// Config key holding this integration's credential.
  pub fn config_key(&self) -> &'static str {
    match self {
      Self::Telegram => keys::TELEGRAM_BOT_TOKEN,
      Self::Discord => keys::DISCORD_BOT_TOKEN,
      Self::Slack => keys::SLACK_BOT_TOKEN,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Telegram => "Telegram",
      Self::Discord => "Discord",
      Self::Slack => "Slack",
    }
  }
}

impl fmt::Display for OptionalService {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// What the host should look like after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfig {
  pub repo_url: String,
  pub install_dir: PathBuf,
  /// Minimum Node.js major version.
  pub runtime_major: u32,
  /// OS packages; empty means none are managed.
  pub packages: Vec<String>,
  /// Config values always applied, in file order.
  pub values: Vec<(String, String)>,
  /// Optional integrations chosen in this run.
  pub selected: BTreeSet<OptionalService>,
  /// Credentials for optional integrations, applied only when selected.
  pub credentials: BTreeMap<OptionalService, String>,
  /// Units to register and run, bridge first.
  pub units: Vec<ServiceUnit>,
  /// Replace registered units whose definition drifted.
  pub recreate_services: bool,
  /// Fast-forward an existing checkout.
  pub update_repository: bool,
}

impl DesiredConfig {
  pub fn new(repo_url: impl Into<String>, install_dir: impl Into<PathBuf>) -> Self {
    Self {
      repo_url: repo_url.into(),
      install_dir: install_dir.into(),
      runtime_major: DEFAULT_NODE_MAJOR,
      packages: Vec::new(),
      values: Vec::new(),
      selected: BTreeSet::new(),
      credentials: BTreeMap::new(),
      units: Vec::new(),
      recreate_services: false,
      update_repository: false,
    }
  }

  /// Set a value, replacing an earlier one for the same key.
  pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
    let key = key.into();
    let value = value.into();
    match self.values.iter_mut().find(|(k, _)| *k == key) {
      Some(entry) => entry.1 = value,
      None => self.values.push((key, value)),
    }
  }

  /// Select `service` with its credential.
  pub fn select(&mut self, service: OptionalService, credential: impl Into<String>) {
    self.selected.insert(service);
    self.credentials.insert(service, credential.into());
  }

  /// Every key/value the config should hold: plain values, then selected credentials.
  pub fn config_entries(&self) -> Vec<(&str, &str)> {
    let mut entries: Vec<(&str, &str)> = self.values.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    for service in &self.selected {
      if let Some(credential) = self.credentials.get(service) {
        entries.push((service.config_key(), credential.as_str()));
      }
    }
    entries
  }
}

impl From<&DesiredConfig> for ProbeRequest {
  fn from(desired: &DesiredConfig) -> Self {
    Self {
      runtime_major: desired.runtime_major,
      packages: desired.packages.clone(),
      units: desired.units.clone(),
    }
  }
}

/// One step of a plan. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  InstallRuntime { major: u32 },
  InstallPackages(Vec<String>),
  CloneOrUpdateRepo { url: String, dest: PathBuf },
  InstallDependencies,
  SetConfigValue { key: String, value: String },
  StopService(String),
  RegisterService(ServiceUnit),
  StartService(String),
  RestartService(String),
  RemoveService(String),
  /// Already satisfied; kept so replays stay observable.
  Noop(Resource),
}

impl Action {
  /// Failures of best-effort actions are warnings; all others abort the run.
  pub fn is_best_effort(&self) -> bool {
    matches!(self, Action::InstallPackages(_) | Action::InstallDependencies)
  }

  pub fn is_noop(&self) -> bool {
    matches!(self, Action::Noop(_))
  }

  /// The resource this action converges.
  pub fn resource(&self) -> Resource {
    match self {
      Action::InstallRuntime { .. } => Resource::Runtime,
      Action::InstallPackages(_) => Resource::Packages,
      Action::CloneOrUpdateRepo { .. } => Resource::Repository,
      Action::InstallDependencies => Resource::Dependencies,
      Action::SetConfigValue { key, .. } => Resource::ConfigKey(key.clone()),
      Action::RegisterService(unit) => Resource::Service(unit.name.clone()),
      Action::StopService(name)
      | Action::StartService(name)
      | Action::RestartService(name)
      | Action::RemoveService(name) => Resource::Service(name.clone()),
      Action::Noop(resource) => resource.clone(),
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::InstallRuntime { major } => write!(f, "install Node.js {}", major),
      Action::InstallPackages(packages) => write!(f, "install packages: {}", packages.join(" ")),
      Action::CloneOrUpdateRepo { url, dest } => write!(f, "clone or update {} in {}", url, dest.display()),
      Action::InstallDependencies => write!(f, "install npm dependencies"),
      Action::SetConfigValue { key, .. } if is_secret_key(key) => write!(f, "set {}=********", key),
      Action::SetConfigValue { key, value } => write!(f, "set {}={}", key, value),
      Action::StopService(name) => write!(f, "stop {}", name),
      Action::RegisterService(unit) => write!(f, "register {}", unit.name),
      Action::StartService(name) => write!(f, "start {}", name),
      Action::RestartService(name) => write!(f, "restart {}", name),
      Action::RemoveService(name) => write!(f, "remove {}", name),
      Action::Noop(resource) => write!(f, "{} up to date", resource),
    }
  }
}

/// Ordered actions produced by the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
  pub actions: Vec<Action>,
}

impl Plan {
  /// Actions that change the host, in order.
  pub fn changes(&self) -> impl Iterator<Item = &Action> {
    self.actions.iter().filter(|a| !a.is_noop())
  }

  pub fn change_count(&self) -> usize {
    self.changes().count()
  }

  /// True when every action is a no-op.
  pub fn is_empty(&self) -> bool {
    self.change_count() == 0
  }
}
