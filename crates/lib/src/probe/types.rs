//! Probe results.

use std::collections::BTreeMap;
use std::fmt;

use crate::service::ServiceUnit;

/// Something on the host the engine can check and converge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
  /// The Node.js runtime.
  Runtime,
  /// Extra OS packages.
  Packages,
  /// The bridge checkout.
  Repository,
  /// `node_modules` inside the checkout.
  Dependencies,
  ConfigKey(String),
  Service(String),
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Resource::Runtime => write!(f, "runtime"),
      Resource::Packages => write!(f, "packages"),
      Resource::Repository => write!(f, "repository"),
      Resource::Dependencies => write!(f, "dependencies"),
      Resource::ConfigKey(key) => write!(f, "config:{}", key),
      Resource::Service(name) => write!(f, "service:{}", name),
    }
  }
}

/// Observed state of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
  Missing,
  /// Present, with a version, path or value.
  Present(String),
  /// Present but unusable as-is.
  Misconfigured(String),
  /// The probe could not tell. Planned like [`ResourceState::Missing`].
  Unknown(String),
}

impl ResourceState {
  pub fn is_present(&self) -> bool {
    matches!(self, ResourceState::Present(_))
  }

  pub fn value(&self) -> Option<&str> {
    match self {
      ResourceState::Present(value) => Some(value),
      _ => None,
    }
  }
}

impl fmt::Display for ResourceState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResourceState::Missing => write!(f, "missing"),
      ResourceState::Present(detail) => write!(f, "present ({})", detail),
      ResourceState::Misconfigured(reason) => write!(f, "misconfigured: {}", reason),
      ResourceState::Unknown(reason) => write!(f, "unknown: {}", reason),
    }
  }
}

/// Registration and runtime state of one managed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
  Unregistered,
  /// Registered but not running. `drifted` when the installed definition
  /// differs from the current rendering.
  Stopped { drifted: bool },
  Running { drifted: bool },
  /// The service manager could not be queried.
  Unknown,
}

impl ServiceState {
  pub fn is_running(&self) -> bool {
    matches!(self, ServiceState::Running { .. })
  }

  pub fn is_drifted(&self) -> bool {
    matches!(
      self,
      ServiceState::Stopped { drifted: true } | ServiceState::Running { drifted: true }
    )
  }
}

impl fmt::Display for ServiceState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let drift = |drifted: &bool| if *drifted { ", drifted" } else { "" };
    match self {
      ServiceState::Unregistered => write!(f, "unregistered"),
      ServiceState::Stopped { drifted } => write!(f, "stopped{}", drift(drifted)),
      ServiceState::Running { drifted } => write!(f, "running{}", drift(drifted)),
      ServiceState::Unknown => write!(f, "unknown"),
    }
  }
}

/// Snapshot of the host taken at the start of a run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostState {
  pub resources: BTreeMap<Resource, ResourceState>,
  pub services: BTreeMap<String, ServiceState>,
}

impl HostState {
  /// State of `resource`; anything not probed counts as missing.
  pub fn resource(&self, resource: &Resource) -> &ResourceState {
    self.resources.get(resource).unwrap_or(&ResourceState::Missing)
  }

  pub fn is_present(&self, resource: &Resource) -> bool {
    self.resource(resource).is_present()
  }

  pub fn config_value(&self, key: &str) -> Option<&str> {
    self.resource(&Resource::ConfigKey(key.to_string())).value()
  }

  pub fn service(&self, name: &str) -> ServiceState {
    self.services.get(name).copied().unwrap_or(ServiceState::Unregistered)
  }
}

/// What the prober should look at beyond the fixed resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeRequest {
  /// Minimum acceptable Node.js major version.
  pub runtime_major: u32,
  pub packages: Vec<String>,
  /// Units whose registration and drift are checked.
  pub units: Vec<ServiceUnit>,
}
