//! Action Planner.
//!
//! [`plan`] is a pure function from a probed [`HostState`] and a
//! [`DesiredConfig`] to an ordered [`Plan`]. Order is fixed by dependency:
//!
//! 1. runtime
//! 2. OS packages (only when any are desired)
//! 3. repository
//! 4. npm dependencies
//! 5. config values
//! 6. service registration (stop first when replacing)
//! 7. service start / restart
//!
//! Satisfied resources yield [`Action::Noop`]. Registered units are only
//! replaced when the caller asks for recreation and the definition drifted.

mod types;

use crate::probe::{HostState, Resource, ServiceState};

pub use types::{Action, DesiredConfig, OptionalService, Plan};

pub fn plan(state: &HostState, desired: &DesiredConfig) -> Plan {
  let mut actions = Vec::new();

  if state.is_present(&Resource::Runtime) {
    actions.push(Action::Noop(Resource::Runtime));
  } else {
    actions.push(Action::InstallRuntime {
      major: desired.runtime_major,
    });
  }

  if !desired.packages.is_empty() {
    if state.is_present(&Resource::Packages) {
      actions.push(Action::Noop(Resource::Packages));
    } else {
      actions.push(Action::InstallPackages(desired.packages.clone()));
    }
  }

  let repo_changes = desired.update_repository || !state.is_present(&Resource::Repository);
  if repo_changes {
    actions.push(Action::CloneOrUpdateRepo {
      url: desired.repo_url.clone(),
      dest: desired.install_dir.clone(),
    });
  } else {
    actions.push(Action::Noop(Resource::Repository));
  }

  if repo_changes || !state.is_present(&Resource::Dependencies) {
    actions.push(Action::InstallDependencies);
  } else {
    actions.push(Action::Noop(Resource::Dependencies));
  }

  let mut config_changes = false;
  for (key, value) in desired.config_entries() {
    if state.config_value(key) == Some(value) {
      actions.push(Action::Noop(Resource::ConfigKey(key.to_string())));
    } else {
      config_changes = true;
      actions.push(Action::SetConfigValue {
        key: key.to_string(),
        value: value.to_string(),
      });
    }
  }

  // Anything the running bridge reads at startup changed.
  let reload = config_changes || repo_changes;

  let mut starts = Vec::new();
  for unit in &desired.units {
    let name = unit.name.clone();
    let current = state.service(&name);
    let replace = desired.recreate_services && current.is_drifted();

    match current {
      ServiceState::Unregistered => {
        actions.push(Action::RegisterService(unit.clone()));
        starts.push(Action::StartService(name));
      }
      ServiceState::Unknown => {
        actions.push(Action::StopService(name.clone()));
        actions.push(Action::RegisterService(unit.clone()));
        starts.push(Action::StartService(name));
      }
      ServiceState::Stopped { .. } => {
        if replace {
          actions.push(Action::RegisterService(unit.clone()));
        }
        starts.push(Action::StartService(name));
      }
      ServiceState::Running { .. } if replace => {
        actions.push(Action::StopService(name.clone()));
        actions.push(Action::RegisterService(unit.clone()));
        starts.push(Action::StartService(name));
      }
      ServiceState::Running { .. } if reload => starts.push(Action::RestartService(name)),
      ServiceState::Running { .. } => starts.push(Action::Noop(Resource::Service(name))),
    }
  }
  actions.extend(starts);

  Plan { actions }
}

/// Stop and remove every registered unit in `units`.
pub fn plan_uninstall(state: &HostState, units: &[&str]) -> Plan {
  let mut actions = Vec::new();
  for &name in units {
    match state.service(name) {
      ServiceState::Unregistered => actions.push(Action::Noop(Resource::Service(name.to_string()))),
      ServiceState::Stopped { .. } => actions.push(Action::RemoveService(name.to_string())),
      ServiceState::Running { .. } | ServiceState::Unknown => {
        actions.push(Action::StopService(name.to_string()));
        actions.push(Action::RemoveService(name.to_string()));
      }
    }
  }
  Plan { actions }
}
