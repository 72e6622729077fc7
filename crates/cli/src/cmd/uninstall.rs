//! Implementation of `clawup --uninstall`.
//!
//! Stops and removes every managed unit, then asks whether to delete the
//! checkout. The answer defaults to no.

use anyhow::{Context, Result, bail};

use clawup_lib::engine::Engine;
use clawup_lib::host::SystemRunner;
use clawup_lib::platform::PlatformProfile;
use clawup_lib::prompt::{DefaultsPrompt, UserPrompt};
use clawup_lib::service::registrar_for;

use crate::output::{print_error, print_info, print_plan, print_success};
use crate::prompts::{is_interactive, prompt_for};

pub fn cmd_uninstall(profile: &PlatformProfile, yes: bool) -> Result<()> {
  let runner = SystemRunner;
  let registrar = registrar_for(profile, &runner);
  let engine = Engine::new(profile, &runner, registrar.as_ref());

  let report = engine.uninstall();
  if report.plan.is_empty() {
    print_info("No clawup services are registered");
  } else {
    print_plan(&report.plan);
  }
  if let Some((action, error)) = &report.execution.failed {
    print_error(&format!("{} failed: {}", action, error));
    bail!("Uninstall stopped; re-run clawup --uninstall to continue.");
  }

  let install_dir = &profile.paths.install_dir;
  if !install_dir.exists() {
    print_success("Uninstall complete");
    return Ok(());
  }

  // Without a terminal the checkout is kept rather than failing the uninstall.
  let prompt: Box<dyn UserPrompt> = if yes || is_interactive() {
    prompt_for(yes)?
  } else {
    Box::new(DefaultsPrompt)
  };
  let delete = prompt
    .confirm(&format!("Delete {} and its configuration?", install_dir.display()), false)
    .context("Failed to read answer")?;

  if delete {
    engine.remove_install_dir()?;
    print_success(&format!("Removed {}", install_dir.display()));
  } else {
    print_info(&format!("Kept {}", install_dir.display()));
  }
  print_success("Uninstall complete");

  Ok(())
}
