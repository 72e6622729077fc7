//! External command execution.
//!
//! Every package manager, `git`, `npm` and service-manager invocation goes
//! through a [`CommandRunner`], so the prober and executor can be driven
//! against a simulated host in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum HostError {
  /// The program could not be started at all.
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The program ran and exited unsuccessfully.
  #[error("command failed with exit code {:?}: {}{}", .code, .command, stderr_suffix(.stderr))]
  Failed {
    command: String,
    code: Option<i32>,
    stderr: String,
  },
}

fn stderr_suffix(stderr: &str) -> String {
  let trimmed = stderr.trim();
  if trimmed.is_empty() {
    String::new()
  } else {
    format!(" ({})", trimmed.lines().last().unwrap_or(trimmed))
  }
}

/// A fully described command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  pub env: BTreeMap<String, String>,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  /// Wrap this command in `sudo` unless the caller already runs as root.
  pub fn privileged(self, elevated: bool) -> Self {
    if elevated {
      return self;
    }
    let mut args = Vec::with_capacity(self.args.len() + 2);
    if !self.env.is_empty() {
      args.push("-E".to_string());
    }
    args.push(self.program);
    args.extend(self.args);
    Self {
      program: "sudo".to_string(),
      args,
      cwd: self.cwd,
      env: self.env,
    }
  }
}

impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      if arg.contains(char::is_whitespace) {
        write!(f, " '{}'", arg)?;
      } else {
        write!(f, " {}", arg)?;
      }
    }
    Ok(())
  }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  /// Exit code, `None` when terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(stdout: impl Into<String>) -> Self {
    Self {
      code: Some(0),
      stdout: stdout.into(),
      stderr: String::new(),
    }
  }

  pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
    Self {
      code: Some(code),
      stdout: String::new(),
      stderr: stderr.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Runs external commands synchronously.
pub trait CommandRunner {
  /// Run a command to completion.
  ///
  /// Returns `Err` only when the program could not be spawned; a non-zero exit
  /// is reported through [`CommandOutput::code`].
  fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Runs commands on the real host via `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
    debug!(command = %spec, cwd = ?spec.cwd, "spawning process");

    let mut command = Command::new(&spec.program);
    command.args(&spec.args).envs(&spec.env);
    if let Some(cwd) = &spec.cwd {
      command.current_dir(cwd);
    }

    let output = command.output()?;
    let result = CommandOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.is_success() && !result.stderr.is_empty() {
      debug!(stderr = %result.stderr.trim(), "command stderr");
    }

    Ok(result)
  }
}

/// Run a command and turn a non-zero exit into [`HostError::Failed`].
///
/// Returns trimmed stdout on success.
pub fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<String, HostError> {
  let output = runner.run(spec).map_err(|source| HostError::Spawn {
    program: spec.program.clone(),
    source,
  })?;

  if !output.is_success() {
    return Err(HostError::Failed {
      command: spec.to_string(),
      code: output.code,
      stderr: output.stderr,
    });
  }

  Ok(output.stdout.trim().to_string())
}
