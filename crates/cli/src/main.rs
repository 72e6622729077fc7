mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use clawup_lib::consts::DEFAULT_REPO_URL;
use clawup_lib::platform::{PathOverrides, PlatformProfile};

use crate::output::OutputFormat;

/// Install, update and remove the CarClaw bridge.
///
/// Without flags, runs the install wizard. Every run probes the host first
/// and only applies what is missing, so re-running is always safe.
#[derive(Parser)]
#[command(name = "clawup")]
#[command(author, version, about, long_about)]
struct Cli {
  /// Stop and remove the bridge services, then offer to delete the checkout
  #[arg(long, conflicts_with_all = ["status", "dry_run", "update"])]
  uninstall: bool,

  /// Show the probed host state and exit
  #[arg(long, conflicts_with_all = ["dry_run", "update"])]
  status: bool,

  /// Run the wizard and print the plan without applying it
  #[arg(long)]
  dry_run: bool,

  /// Fast-forward an existing checkout of the bridge
  #[arg(long)]
  update: bool,

  /// Accept the default answer to every question
  #[arg(short, long)]
  yes: bool,

  /// Install directory (default: $CLAWUP_INSTALL_DIR, then the platform data dir)
  #[arg(long, value_name = "PATH")]
  install_dir: Option<PathBuf>,

  /// Git remote of the bridge (default: $CLAWUP_REPO_URL, then the upstream repository)
  #[arg(long, value_name = "URL")]
  repo_url: Option<String>,

  /// Time limit for each credential check, e.g. "10s"
  #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration, default_value = "10s")]
  check_timeout: Duration,

  /// Output format for --status
  #[arg(long, value_enum, default_value_t)]
  format: OutputFormat,

  /// Enable debug logging
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let profile = detect_profile(cli.install_dir.clone())?;
  debug!(?profile, "detected platform");

  if cli.status {
    return cmd::cmd_status(&profile, cli.format);
  }
  if cli.uninstall {
    return cmd::cmd_uninstall(&profile, cli.yes);
  }

  let options = cmd::InstallOptions {
    repo_url: cli
      .repo_url
      .or_else(|| std::env::var("CLAWUP_REPO_URL").ok().filter(|v| !v.is_empty()))
      .unwrap_or_else(|| DEFAULT_REPO_URL.to_string()),
    update: cli.update,
    dry_run: cli.dry_run,
    yes: cli.yes,
    check_timeout: cli.check_timeout,
  };
  cmd::cmd_install(&profile, &options)
}

fn detect_profile(install_dir: Option<PathBuf>) -> Result<PlatformProfile> {
  let install_dir = install_dir.map(absolute).transpose()?;
  let overrides = PathOverrides {
    install_dir,
    ..Default::default()
  }
  .or(PathOverrides::from_env());
  PlatformProfile::detect(&overrides).context("Failed to detect platform")
}

/// Resolve a user-supplied path against the working directory.
fn absolute(path: PathBuf) -> Result<PathBuf> {
  if path.exists() {
    return dunce::canonicalize(&path).with_context(|| format!("Failed to resolve {}", path.display()));
  }
  if path.is_absolute() {
    return Ok(path);
  }
  let cwd = std::env::current_dir().context("Failed to read current directory")?;
  Ok(cwd.join(path))
}
