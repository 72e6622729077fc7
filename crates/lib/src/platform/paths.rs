use std::path::PathBuf;

use crate::consts::APP_NAME;

use super::PlatformError;

/// Returns the user's home directory
pub fn home_dir() -> Result<PathBuf, PlatformError> {
  std::env::var_os("HOME")
    .filter(|home| !home.is_empty())
    .map(PathBuf::from)
    .ok_or(PlatformError::NoHome)
}

/// Returns the XDG configuration root (not namespaced by the application)
pub fn config_home() -> Result<PathBuf, PlatformError> {
  match std::env::var("XDG_CONFIG_HOME") {
    Ok(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
    _ => Ok(home_dir()?.join(".config")),
  }
}

/// Returns the directory for data files for the application
pub fn data_dir() -> Result<PathBuf, PlatformError> {
  let data_home = match std::env::var("XDG_DATA_HOME") {
    Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => home_dir()?.join(".local").join("share"),
  };
  Ok(data_home.join(APP_NAME))
}

/// Returns the directory for state files (logs) for the application
pub fn state_dir() -> Result<PathBuf, PlatformError> {
  let state_home = match std::env::var("XDG_STATE_HOME") {
    Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => home_dir()?.join(".local").join("state"),
  };
  Ok(state_home.join(APP_NAME))
}

/// Per-user launchd agents directory
pub fn launch_agents_dir() -> Result<PathBuf, PlatformError> {
  Ok(home_dir()?.join("Library").join("LaunchAgents"))
}

/// Per-user log directory on macOS
pub fn macos_log_dir() -> Result<PathBuf, PlatformError> {
  Ok(home_dir()?.join("Library").join("Logs").join(APP_NAME))
}

/// Read a path override from the environment, ignoring empty values.
pub fn env_override(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}
