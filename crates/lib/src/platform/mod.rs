//! Host platform detection.
//!
//! Everything that varies between macOS and Debian/Ubuntu hosts (service
//! backend, package manager, filesystem conventions) is captured once in a
//! [`PlatformProfile`] and passed explicitly to the rest of the engine.

pub mod arch;
pub mod os;
pub mod packages;
pub mod paths;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::consts::{APP_NAME, CONFIG_FILE_NAME};

pub use arch::Arch;
pub use os::Os;
pub use packages::PackageManager;

#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("unsupported operating system: {0}")]
  UnsupportedOs(String),

  #[error("unsupported CPU architecture: {0}")]
  UnsupportedArch(String),

  #[error("HOME is not set")]
  NoHome,
}

/// Scope of systemd units: per-user manager or the system manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemdScope {
  User,
  System,
}

/// Service manager used to run background units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceBackend {
  Systemd(SystemdScope),
  Launchd,
}

impl ServiceBackend {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Systemd(SystemdScope::User) => "systemd (user)",
      Self::Systemd(SystemdScope::System) => "systemd (system)",
      Self::Launchd => "launchd",
    }
  }
}

impl fmt::Display for ServiceBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Where things live on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConventions {
  /// Checkout of the bridge application.
  pub install_dir: PathBuf,
  /// The bridge's `.env` file.
  pub config_file: PathBuf,
  /// Directory holding unit files or launchd property lists.
  pub unit_dir: PathBuf,
  /// Directory receiving unit stdout/stderr.
  pub log_dir: PathBuf,
  /// Directory containing the `node` and `npm` binaries once installed.
  pub node_bin_dir: PathBuf,
}

/// Explicit path choices that win over platform defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOverrides {
  pub install_dir: Option<PathBuf>,
  pub unit_dir: Option<PathBuf>,
  pub log_dir: Option<PathBuf>,
}

impl PathOverrides {
  /// Overrides taken from `CLAWUP_INSTALL_DIR`, `CLAWUP_UNIT_DIR` and `CLAWUP_LOG_DIR`.
  pub fn from_env() -> Self {
    Self {
      install_dir: paths::env_override("CLAWUP_INSTALL_DIR"),
      unit_dir: paths::env_override("CLAWUP_UNIT_DIR"),
      log_dir: paths::env_override("CLAWUP_LOG_DIR"),
    }
  }

  /// Fill any unset field from `fallback`.
  pub fn or(self, fallback: PathOverrides) -> Self {
    Self {
      install_dir: self.install_dir.or(fallback.install_dir),
      unit_dir: self.unit_dir.or(fallback.unit_dir),
      log_dir: self.log_dir.or(fallback.log_dir),
    }
  }
}

/// Everything platform-specific the engine needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
  pub os: Os,
  pub arch: Arch,
  pub service_backend: ServiceBackend,
  pub package_manager: PackageManager,
  pub paths: PathConventions,
  /// Whether the installer runs as root.
  pub elevated: bool,
  /// Numeric user id, used for the launchd `gui/<uid>` domain.
  pub uid: u32,
}

impl PlatformProfile {
  /// Detect the profile for the current host.
  pub fn detect(overrides: &PathOverrides) -> Result<Self, PlatformError> {
    let os = Os::current().ok_or_else(|| PlatformError::UnsupportedOs(std::env::consts::OS.to_string()))?;
    let arch = Arch::current().ok_or_else(|| PlatformError::UnsupportedArch(std::env::consts::ARCH.to_string()))?;
    let (elevated, uid) = current_user();
    Self::for_host(os, arch, elevated, uid, overrides)
  }

  /// Build the profile for an explicit host description.
  pub fn for_host(os: Os, arch: Arch, elevated: bool, uid: u32, overrides: &PathOverrides) -> Result<Self, PlatformError> {
    let (service_backend, package_manager) = match os {
      Os::Linux => {
        let scope = if elevated { SystemdScope::System } else { SystemdScope::User };
        (ServiceBackend::Systemd(scope), PackageManager::Apt)
      }
      Os::MacOs => (ServiceBackend::Launchd, PackageManager::Brew),
    };

    let install_dir = match &overrides.install_dir {
      Some(dir) => dir.clone(),
      None => paths::data_dir()?.join("bridge"),
    };

    let unit_dir = match &overrides.unit_dir {
      Some(dir) => dir.clone(),
      None => match service_backend {
        ServiceBackend::Systemd(SystemdScope::User) => paths::config_home()?.join("systemd").join("user"),
        ServiceBackend::Systemd(SystemdScope::System) => PathBuf::from("/etc/systemd/system"),
        ServiceBackend::Launchd => paths::launch_agents_dir()?,
      },
    };

    let log_dir = match &overrides.log_dir {
      Some(dir) => dir.clone(),
      None => match os {
        Os::Linux if elevated => PathBuf::from("/var/log").join(APP_NAME),
        Os::Linux => paths::state_dir()?.join("logs"),
        Os::MacOs => paths::macos_log_dir()?,
      },
    };

    let paths = PathConventions {
      config_file: install_dir.join(CONFIG_FILE_NAME),
      install_dir,
      unit_dir,
      log_dir,
      node_bin_dir: package_manager.node_bin_dir(arch),
    };

    Ok(Self {
      os,
      arch,
      service_backend,
      package_manager,
      paths,
      elevated,
      uid,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

#[cfg(unix)]
fn current_user() -> (bool, u32) {
  let euid = rustix::process::geteuid();
  (euid.is_root(), rustix::process::getuid().as_raw())
}

#[cfg(not(unix))]
fn current_user() -> (bool, u32) {
  (false, 0)
}
