//! Implementation of the install wizard (no flags, `--dry-run`, `--update`).
//!
//! Probes the host, asks the wizard questions, plans and applies the
//! changes, then syntax-checks the bridge.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use clawup_lib::credentials::HttpValidator;
use clawup_lib::engine::{Engine, HealthCheck};
use clawup_lib::host::SystemRunner;
use clawup_lib::platform::PlatformProfile;
use clawup_lib::service::registrar_for;
use clawup_lib::wizard::{WizardOptions, gather_desired};

use crate::output::{format_duration, print_error, print_info, print_plan, print_stat, print_success, print_warning};
use crate::prompts::prompt_for;

pub struct InstallOptions {
  pub repo_url: String,
  pub update: bool,
  pub dry_run: bool,
  pub yes: bool,
  pub check_timeout: Duration,
}

pub fn cmd_install(profile: &PlatformProfile, options: &InstallOptions) -> Result<()> {
  let runner = SystemRunner;
  let registrar = registrar_for(profile, &runner);
  let engine = Engine::new(profile, &runner, registrar.as_ref());

  print_info(&format!(
    "Installing the CarClaw bridge on {} ({}, {})",
    profile.triple(),
    profile.service_backend,
    profile.package_manager
  ));
  print_stat("Install dir", &profile.paths.install_dir.display().to_string());
  println!();

  let state = engine.survey();
  let prompt = prompt_for(options.yes)?;
  let validator = HttpValidator::new(options.check_timeout).context("Failed to create HTTP client")?;
  let wizard_options = WizardOptions {
    repo_url: options.repo_url.clone(),
    update_repository: options.update,
  };
  let outcome =
    gather_desired(prompt.as_ref(), &validator, profile, &state, &wizard_options).context("Install wizard failed")?;

  for (service, identity) in &outcome.accepted {
    print_success(&format!("{} credential accepted ({})", service, identity));
  }
  for rejection in &outcome.rejected {
    print_warning(&format!(
      "{} credential not accepted ({}); leaving {} unchanged",
      rejection.service, rejection.reason, rejection.service
    ));
  }

  if options.dry_run {
    let plan = engine.plan(&outcome.desired);
    println!();
    if plan.is_empty() {
      print_info("No changes would be made");
    } else {
      print_plan(&plan);
      println!();
      print_info(&format!("Would apply {} change(s)", plan.change_count()));
    }
    return Ok(());
  }

  let start = Instant::now();
  let report = engine.reconcile(&outcome.desired);

  println!();
  if report.plan.is_empty() {
    print_info("Everything is already up to date");
  } else {
    for action in &report.execution.applied {
      print_success(&action.to_string());
    }
  }
  for (action, error) in &report.execution.warnings {
    print_warning(&format!("{} failed, continuing: {}", action, error));
  }
  if let Some((action, error)) = &report.execution.failed {
    print_error(&format!("{} failed: {}", action, error));
    bail!("Install stopped. Re-run clawup once the problem is fixed; completed steps are skipped.");
  }

  match engine.health_check() {
    HealthCheck::Passed { entry } => print_success(&format!("Health check passed ({})", entry.display())),
    HealthCheck::Failed { entry, reason } => {
      print_warning(&format!("Health check failed for {}: {}", entry.display(), reason))
    }
    HealthCheck::Skipped { reason } => print_warning(&format!("Health check skipped: {}", reason)),
  }

  println!();
  print_success(&format!(
    "Done in {} ({} change(s))",
    format_duration(start.elapsed()),
    report.execution.applied.len()
  ));
  print_stat("Config", &profile.paths.config_file.display().to_string());
  print_stat("Logs", &profile.paths.log_dir.display().to_string());

  Ok(())
}
