//! The units the installer manages, built from the platform profile.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::consts::{
  AGENT_UNIT, BRIDGE_UNIT, DISCOVERY_INSTANCE_NAME, DISCOVERY_SERVICE_TYPE, DISCOVERY_UNIT, RESTART_DELAY_SECS,
};
use crate::platform::{Os, PlatformProfile};

use super::{RestartPolicy, ServiceUnit};

/// Which optional units accompany the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSelection {
  pub agent: bool,
  pub discovery: bool,
  pub port: u16,
}

/// The bridge unit first, then the agent daemon and discovery advertiser when selected.
pub fn managed_units(profile: &PlatformProfile, selection: &UnitSelection) -> Vec<ServiceUnit> {
  let mut units = vec![bridge_unit(profile)];
  if selection.agent {
    units.push(agent_unit(profile));
  }
  if selection.discovery {
    units.push(discovery_unit(profile, selection.port));
  }
  units
}

pub fn bridge_unit(profile: &PlatformProfile) -> ServiceUnit {
  npm_unit(profile, BRIDGE_UNIT, "CarClaw bridge", &["start"])
}

pub fn agent_unit(profile: &PlatformProfile) -> ServiceUnit {
  npm_unit(profile, AGENT_UNIT, "CarClaw agent daemon", &["run", "agent"])
}

/// Advertises `_carclaw._tcp` on `port` so clients can find the bridge.
pub fn discovery_unit(profile: &PlatformProfile, port: u16) -> ServiceUnit {
  let port = port.to_string();
  let (executable_path, args) = match profile.os {
    Os::MacOs => (
      PathBuf::from("/usr/bin/dns-sd"),
      vec!["-R", DISCOVERY_INSTANCE_NAME, DISCOVERY_SERVICE_TYPE, "local", port.as_str()],
    ),
    Os::Linux => (
      PathBuf::from("/usr/bin/avahi-publish-service"),
      vec![DISCOVERY_INSTANCE_NAME, DISCOVERY_SERVICE_TYPE, port.as_str()],
    ),
  };

  ServiceUnit {
    name: DISCOVERY_UNIT.to_string(),
    description: format!("CarClaw discovery ({})", DISCOVERY_SERVICE_TYPE),
    executable_path,
    args: args.into_iter().map(str::to_string).collect(),
    working_dir: profile.paths.install_dir.clone(),
    env_vars: BTreeMap::new(),
    restart_policy: RestartPolicy::Always {
      delay_secs: RESTART_DELAY_SECS,
    },
    log_path: profile.paths.log_dir.join(format!("{}.log", DISCOVERY_UNIT)),
  }
}

/// OS packages the discovery advertiser needs on this platform.
pub fn discovery_packages(profile: &PlatformProfile) -> Vec<String> {
  match profile.os {
    Os::Linux => vec!["avahi-utils".to_string()],
    Os::MacOs => Vec::new(),
  }
}

fn npm_unit(profile: &PlatformProfile, name: &str, description: &str, args: &[&str]) -> ServiceUnit {
  let bin_dir = &profile.paths.node_bin_dir;
  let mut env_vars = BTreeMap::new();
  env_vars.insert("NODE_ENV".to_string(), "production".to_string());
  env_vars.insert(
    "PATH".to_string(),
    format!("{}:/usr/local/bin:/usr/bin:/bin", bin_dir.display()),
  );

  ServiceUnit {
    name: name.to_string(),
    description: description.to_string(),
    executable_path: bin_dir.join("npm"),
    args: args.iter().map(|a| a.to_string()).collect(),
    working_dir: profile.paths.install_dir.clone(),
    env_vars,
    restart_policy: RestartPolicy::OnFailure {
      delay_secs: RESTART_DELAY_SECS,
    },
    log_path: profile.paths.log_dir.join(format!("{}.log", name)),
  }
}
