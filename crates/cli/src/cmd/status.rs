//! Status command implementation.
//!
//! Prints the probed state of every resource and managed unit.

use anyhow::Result;
use serde::Serialize;

use clawup_lib::consts::is_secret_key;
use clawup_lib::engine::Engine;
use clawup_lib::host::SystemRunner;
use clawup_lib::platform::PlatformProfile;
use clawup_lib::probe::{HostState, Resource};
use clawup_lib::service::registrar_for;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

#[derive(Debug, Serialize)]
struct StatusReport {
  platform: String,
  service_backend: String,
  package_manager: String,
  install_dir: String,
  resources: Vec<Entry>,
  config: Vec<Entry>,
  services: Vec<Entry>,
}

#[derive(Debug, Serialize)]
struct Entry {
  name: String,
  state: String,
}

impl StatusReport {
  fn new(profile: &PlatformProfile, state: &HostState) -> Self {
    let mut resources = Vec::new();
    let mut config = Vec::new();
    for (resource, resource_state) in &state.resources {
      match resource {
        Resource::ConfigKey(key) => config.push(Entry {
          name: key.clone(),
          state: if is_secret_key(key) {
            "set".to_string()
          } else {
            resource_state.value().unwrap_or_default().to_string()
          },
        }),
        _ => resources.push(Entry {
          name: resource.to_string(),
          state: resource_state.to_string(),
        }),
      }
    }

    Self {
      platform: profile.triple(),
      service_backend: profile.service_backend.to_string(),
      package_manager: profile.package_manager.to_string(),
      install_dir: profile.paths.install_dir.display().to_string(),
      resources,
      config,
      services: state
        .services
        .iter()
        .map(|(name, service_state)| Entry {
          name: name.clone(),
          state: service_state.to_string(),
        })
        .collect(),
    }
  }
}

pub fn cmd_status(profile: &PlatformProfile, format: OutputFormat) -> Result<()> {
  let runner = SystemRunner;
  let registrar = registrar_for(profile, &runner);
  let engine = Engine::new(profile, &runner, registrar.as_ref());
  let report = StatusReport::new(profile, &engine.survey());

  if format.is_json() {
    return print_json(&report);
  }

  print_info(&format!("clawup v{}", env!("CARGO_PKG_VERSION")));
  print_stat("Platform", &report.platform);
  print_stat("Services", &report.service_backend);
  print_stat("Packages", &report.package_manager);
  print_stat("Install dir", &report.install_dir);

  println!();
  println!("Resources:");
  for entry in &report.resources {
    print_stat(&entry.name, &entry.state);
  }

  println!();
  println!("Config:");
  if report.config.is_empty() {
    print_stat("file", "missing or empty");
  }
  for entry in &report.config {
    print_stat(&entry.name, &entry.state);
  }

  println!();
  println!("Units:");
  for entry in &report.services {
    print_stat(&entry.name, &entry.state);
  }

  Ok(())
}
