use std::path::PathBuf;

use tracing::{debug, info};

use crate::consts::LAUNCHD_LABEL_PREFIX;
use crate::host::{CommandRunner, CommandSpec, run_checked};
use crate::platform::ServiceBackend;

use super::{
  RestartPolicy, ServiceError, ServiceRegistrar, ServiceStatus, ServiceUnit, read_definition, remove_definition,
  write_definition,
};

/// Registers per-user launch agents in the `gui/<uid>` domain.
pub struct LaunchdRegistrar<'a> {
  uid: u32,
  agents_dir: PathBuf,
  runner: &'a dyn CommandRunner,
}

impl<'a> LaunchdRegistrar<'a> {
  pub fn new(uid: u32, agents_dir: PathBuf, runner: &'a dyn CommandRunner) -> Self {
    Self {
      uid,
      agents_dir,
      runner,
    }
  }

  pub fn label(name: &str) -> String {
    format!("{}.{}", LAUNCHD_LABEL_PREFIX, name)
  }

  fn plist_path(&self, name: &str) -> PathBuf {
    self.agents_dir.join(format!("{}.plist", Self::label(name)))
  }

  fn domain(&self) -> String {
    format!("gui/{}", self.uid)
  }

  fn target(&self, name: &str) -> String {
    format!("gui/{}/{}", self.uid, Self::label(name))
  }

  fn launchctl(&self, args: &[&str]) -> Result<String, ServiceError> {
    let spec = CommandSpec::new("launchctl").args(args.iter().copied());
    Ok(run_checked(self.runner, &spec)?)
  }

  /// Whether launchd currently has the job loaded.
  fn is_loaded(&self, name: &str) -> bool {
    let spec = CommandSpec::new("launchctl").args(["print".to_string(), self.target(name)]);
    matches!(self.runner.run(&spec), Ok(output) if output.is_success())
  }

  fn bootstrap(&self, name: &str) -> Result<(), ServiceError> {
    let plist = self.plist_path(name);
    self.launchctl(&["bootstrap", &self.domain(), &plist.to_string_lossy()])?;
    Ok(())
  }
}

impl ServiceRegistrar for LaunchdRegistrar<'_> {
  fn backend(&self) -> ServiceBackend {
    ServiceBackend::Launchd
  }

  fn render(&self, unit: &ServiceUnit) -> String {
    let mut program_arguments = format!("    <string>{}</string>\n", xml_escape(&unit.executable_path.to_string_lossy()));
    for arg in &unit.args {
      program_arguments.push_str(&format!("    <string>{}</string>\n", xml_escape(arg)));
    }

    let environment: String = unit
      .env_vars
      .iter()
      .map(|(key, value)| {
        format!(
          "    <key>{}</key>\n    <string>{}</string>\n",
          xml_escape(key),
          xml_escape(value)
        )
      })
      .collect();

    let keep_alive = match unit.restart_policy {
      RestartPolicy::OnFailure { .. } => "<dict>\n    <key>SuccessfulExit</key>\n    <false/>\n  </dict>",
      RestartPolicy::Always { .. } => "<true/>",
    };

    let log = xml_escape(&unit.log_path.to_string_lossy());

    format!(
      "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
       <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
       <!-- Managed by clawup. Rerun the installer to change it. -->\n\
       <plist version=\"1.0\">\n\
       <dict>\n\
       \x20 <key>Label</key>\n\
       \x20 <string>{label}</string>\n\
       \x20 <key>ProgramArguments</key>\n\
       \x20 <array>\n\
       {program_arguments}\
       \x20 </array>\n\
       \x20 <key>WorkingDirectory</key>\n\
       \x20 <string>{working_dir}</string>\n\
       \x20 <key>EnvironmentVariables</key>\n\
       \x20 <dict>\n\
       {environment}\
       \x20 </dict>\n\
       \x20 <key>RunAtLoad</key>\n\
       \x20 <true/>\n\
       \x20 <key>KeepAlive</key>\n\
       \x20 {keep_alive}\n\
       \x20 <key>ThrottleInterval</key>\n\
       \x20 <integer>{delay}</integer>\n\
       \x20 <key>StandardOutPath</key>\n\
       \x20 <string>{log}</string>\n\
       \x20 <key>StandardErrorPath</key>\n\
       \x20 <string>{log}</string>\n\
       \x20 <key>ProcessType</key>\n\
       \x20 <string>Background</string>\n\
       </dict>\n\
       </plist>\n",
      label = xml_escape(&Self::label(&unit.name)),
      working_dir = xml_escape(&unit.working_dir.to_string_lossy()),
      delay = unit.restart_policy.delay_secs(),
    )
  }

  fn create(&self, unit: &ServiceUnit) -> Result<(), ServiceError> {
    let path = self.plist_path(&unit.name);
    write_definition(&path, &self.render(unit))?;
    info!(unit = %unit.name, path = %path.display(), "wrote launchd property list");
    Ok(())
  }

  fn remove(&self, name: &str) -> Result<(), ServiceError> {
    if self.is_loaded(name) {
      if let Err(e) = self.launchctl(&["bootout", &self.target(name)]) {
        debug!(unit = name, error = %e, "bootout failed");
      }
    }
    remove_definition(&self.plist_path(name))?;
    info!(unit = name, "removed launchd property list");
    Ok(())
  }

  fn start(&self, name: &str) -> Result<(), ServiceError> {
    if self.is_loaded(name) {
      self.launchctl(&["kickstart", &self.target(name)])?;
      return Ok(());
    }
    self.bootstrap(name)
  }

  fn stop(&self, name: &str) -> Result<(), ServiceError> {
    if !self.is_loaded(name) {
      return Ok(());
    }
    self.launchctl(&["bootout", &self.target(name)])?;
    Ok(())
  }

  fn restart(&self, name: &str) -> Result<(), ServiceError> {
    if self.is_loaded(name) {
      self.launchctl(&["kickstart", "-k", &self.target(name)])?;
      return Ok(());
    }
    self.bootstrap(name)
  }

  fn status(&self, name: &str) -> ServiceStatus {
    let spec = CommandSpec::new("launchctl").args(["print".to_string(), self.target(name)]);
    match self.runner.run(&spec) {
      Ok(output) if output.is_success() && output.stdout.contains("state = running") => ServiceStatus::Running,
      Ok(_) => ServiceStatus::Stopped,
      Err(e) => {
        debug!(unit = name, error = %e, "launchctl unavailable");
        ServiceStatus::Unknown
      }
    }
  }

  fn is_registered(&self, name: &str) -> Result<bool, ServiceError> {
    Ok(self.plist_path(name).is_file())
  }

  fn definition(&self, name: &str) -> Result<Option<String>, ServiceError> {
    read_definition(&self.plist_path(name))
  }
}

fn xml_escape(value: &str) -> String {
  value
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
    .replace('\'', "&apos;")
}
