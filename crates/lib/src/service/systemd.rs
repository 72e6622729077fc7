use std::path::PathBuf;

use tracing::{debug, info};

use crate::host::{CommandRunner, CommandSpec, run_checked};
use crate::platform::{ServiceBackend, SystemdScope};

use super::{
  RestartPolicy, ServiceError, ServiceRegistrar, ServiceStatus, ServiceUnit, read_definition, remove_definition,
  write_definition,
};

/// Registers units with systemd through `systemctl`.
pub struct SystemdRegistrar<'a> {
  scope: SystemdScope,
  unit_dir: PathBuf,
  runner: &'a dyn CommandRunner,
}

impl<'a> SystemdRegistrar<'a> {
  pub fn new(scope: SystemdScope, unit_dir: PathBuf, runner: &'a dyn CommandRunner) -> Self {
    Self {
      scope,
      unit_dir,
      runner,
    }
  }

  fn unit_path(&self, name: &str) -> PathBuf {
    self.unit_dir.join(format!("{}.service", name))
  }

  fn systemctl(&self, args: &[&str]) -> CommandSpec {
    let spec = CommandSpec::new("systemctl");
    let spec = match self.scope {
      SystemdScope::User => spec.arg("--user"),
      SystemdScope::System => spec,
    };
    spec.args(args.iter().copied())
  }

  fn run(&self, args: &[&str]) -> Result<String, ServiceError> {
    Ok(run_checked(self.runner, &self.systemctl(args))?)
  }
}

impl ServiceRegistrar for SystemdRegistrar<'_> {
  fn backend(&self) -> ServiceBackend {
    ServiceBackend::Systemd(self.scope)
  }

  fn render(&self, unit: &ServiceUnit) -> String {
    let mut exec_start = quote_arg(&unit.executable_path.to_string_lossy());
    for arg in &unit.args {
      exec_start.push(' ');
      exec_start.push_str(&quote_arg(arg));
    }

    let environment: String = unit
      .env_vars
      .iter()
      .map(|(key, value)| format!("Environment={}\n", quote_arg(&format!("{}={}", key, value))))
      .collect();

    let restart = match unit.restart_policy {
      RestartPolicy::OnFailure { .. } => "on-failure",
      RestartPolicy::Always { .. } => "always",
    };

    let wanted_by = match self.scope {
      SystemdScope::User => "default.target",
      SystemdScope::System => "multi-user.target",
    };

    let log = escape_specifiers(&unit.log_path.to_string_lossy());

    format!(
      "# Managed by clawup. Rerun the installer to change it.\n\
       [Unit]\n\
       Description={description}\n\
       After=network-online.target\n\
       Wants=network-online.target\n\
       \n\
       [Service]\n\
       Type=simple\n\
       WorkingDirectory={working_dir}\n\
       ExecStart={exec_start}\n\
       {environment}\
       Restart={restart}\n\
       RestartSec={delay}\n\
       StandardOutput=append:{log}\n\
       StandardError=append:{log}\n\
       \n\
       [Install]\n\
       WantedBy={wanted_by}\n",
      description = unit.description,
      working_dir = quote_arg(&unit.working_dir.to_string_lossy()),
      delay = unit.restart_policy.delay_secs(),
    )
  }

  fn create(&self, unit: &ServiceUnit) -> Result<(), ServiceError> {
    let path = self.unit_path(&unit.name);
    write_definition(&path, &self.render(unit))?;
    info!(unit = %unit.name, path = %path.display(), "wrote systemd unit");

    self.run(&["daemon-reload"])?;
    self.run(&["enable", &unit.name])?;
    Ok(())
  }

  fn remove(&self, name: &str) -> Result<(), ServiceError> {
    // `disable` fails for units systemd never loaded; the file removal below is what matters.
    if let Err(e) = self.run(&["disable", name]) {
      debug!(unit = name, error = %e, "disable failed");
    }
    remove_definition(&self.unit_path(name))?;
    self.run(&["daemon-reload"])?;
    info!(unit = name, "removed systemd unit");
    Ok(())
  }

  fn start(&self, name: &str) -> Result<(), ServiceError> {
    self.run(&["start", name]).map(|_| ())
  }

  fn stop(&self, name: &str) -> Result<(), ServiceError> {
    if !self.is_registered(name)? {
      return Ok(());
    }
    self.run(&["stop", name]).map(|_| ())
  }

  fn restart(&self, name: &str) -> Result<(), ServiceError> {
    self.run(&["restart", name]).map(|_| ())
  }

  fn status(&self, name: &str) -> ServiceStatus {
    // `is-active` exits non-zero for inactive units, so only stdout is inspected.
    let output = match self.runner.run(&self.systemctl(&["is-active", name])) {
      Ok(output) => output,
      Err(e) => {
        debug!(unit = name, error = %e, "systemctl unavailable");
        return ServiceStatus::Unknown;
      }
    };

    match output.stdout.trim() {
      "active" | "activating" | "reloading" => ServiceStatus::Running,
      "inactive" | "failed" | "deactivating" => ServiceStatus::Stopped,
      _ => ServiceStatus::Unknown,
    }
  }

  fn is_registered(&self, name: &str) -> Result<bool, ServiceError> {
    Ok(self.unit_path(name).is_file())
  }

  fn definition(&self, name: &str) -> Result<Option<String>, ServiceError> {
    read_definition(&self.unit_path(name))
  }
}

/// Quote a value for a systemd command line or assignment when needed.
fn quote_arg(value: &str) -> String {
  let escaped = escape_specifiers(value);
  if escaped.is_empty() || escaped.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '\\') {
    format!("\"{}\"", escaped.replace('\\', "\\\\").replace('"', "\\\""))
  } else {
    escaped
  }
}

/// systemd expands `%` specifiers; a literal percent sign is `%%`.
fn escape_specifiers(value: &str) -> String {
  value.replace('%', "%%")
}
