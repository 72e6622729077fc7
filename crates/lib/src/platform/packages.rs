//! OS package manager commands.

use std::fmt;
use std::path::PathBuf;

use crate::host::CommandSpec;

use super::Arch;

/// Package manager used for the runtime and OS packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
  /// Debian/Ubuntu `apt-get`, elevated through `sudo` when not root.
  Apt,
  /// Homebrew on macOS, always run as the invoking user.
  Brew,
}

impl PackageManager {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Apt => "apt",
      Self::Brew => "brew",
    }
  }

  /// Directory holding `node`/`npm` after [`runtime_install`](Self::runtime_install).
  pub fn node_bin_dir(&self, arch: Arch) -> PathBuf {
    match self {
      Self::Apt => PathBuf::from("/usr/bin"),
      Self::Brew => PathBuf::from(arch.homebrew_prefix()).join("bin"),
    }
  }

  /// Commands installing Node.js of the given major version.
  ///
  /// The NodeSource setup script is piped into bash; `pipefail` makes a failed
  /// download fail the step instead of feeding an empty script to `bash -`.
  pub fn runtime_install(&self, major: u32, elevated: bool) -> Vec<CommandSpec> {
    match self {
      Self::Apt => {
        let pipe_to = if elevated { "bash -" } else { "sudo -E bash -" };
        vec![
          CommandSpec::new("bash").args([
            "-c".to_string(),
            format!("set -o pipefail; curl -fsSL https://deb.nodesource.com/setup_{major}.x | {pipe_to}"),
          ]),
          apt_get(["install", "-y", "nodejs"], elevated),
        ]
      }
      Self::Brew => {
        let formula = format!("node@{major}");
        vec![
          CommandSpec::new("brew").args(["install", formula.as_str()]),
          CommandSpec::new("brew").args(["link", "--overwrite", "--force", formula.as_str()]),
        ]
      }
    }
  }

  /// Commands installing a set of OS packages.
  pub fn package_install(&self, packages: &[String], elevated: bool) -> Vec<CommandSpec> {
    match self {
      Self::Apt => vec![
        apt_get(["update"], elevated),
        apt_get(["install", "-y"], elevated).args(packages.iter().cloned()),
      ],
      Self::Brew => vec![CommandSpec::new("brew").arg("install").args(packages.iter().cloned())],
    }
  }

  /// Side-effect free query for one package.
  pub fn package_query(&self, package: &str) -> CommandSpec {
    match self {
      Self::Apt => CommandSpec::new("dpkg-query").args(["-W", "-f=${Status}", package]),
      Self::Brew => CommandSpec::new("brew").args(["list", "--versions", package]),
    }
  }

  /// Interpret the stdout of a successful [`package_query`](Self::package_query).
  pub fn query_reports_installed(&self, stdout: &str) -> bool {
    match self {
      Self::Apt => stdout.trim_end().ends_with("install ok installed"),
      Self::Brew => !stdout.trim().is_empty(),
    }
  }
}

impl fmt::Display for PackageManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

fn apt_get<const N: usize>(args: [&str; N], elevated: bool) -> CommandSpec {
  CommandSpec::new("apt-get")
    .args(args)
    .env("DEBIAN_FRONTEND", "noninteractive")
    .privileged(elevated)
}
