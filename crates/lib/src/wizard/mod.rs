//! Install wizard.
//!
//! Turns answers from a [`UserPrompt`] into a [`DesiredConfig`]. Values
//! already in the bridge config are offered as defaults. Credentials for
//! optional integrations are checked with a [`CredentialValidator`]; a
//! rejected credential deselects that integration and the run continues.

use thiserror::Error;
use tracing::{info, warn};

use crate::consts::{AGENT_UNIT, DEFAULT_AGENTS, DEFAULT_PORT, DISCOVERY_SERVICE_TYPE, keys};
use crate::credentials::{CredentialValidator, Validation};
use crate::plan::{DesiredConfig, OptionalService};
use crate::platform::PlatformProfile;
use crate::probe::{HostState, ServiceState};
use crate::prompt::{PromptError, UserPrompt};
use crate::service::units::{UnitSelection, discovery_packages, managed_units};

const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum WizardError {
  #[error(transparent)]
  Prompt(#[from] PromptError),

  #[error("invalid answer for {question:?}: {reason}")]
  InvalidAnswer { question: String, reason: String },
}

/// Inputs that do not come from prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardOptions {
  pub repo_url: String,
  pub update_repository: bool,
}

/// A credential the remote API refused, or that could not be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
  pub service: OptionalService,
  pub reason: String,
}

#[derive(Debug, Clone)]
pub struct WizardOutcome {
  pub desired: DesiredConfig,
  /// Integrations whose credential was accepted, with the reported identity.
  pub accepted: Vec<(OptionalService, String)>,
  pub rejected: Vec<Rejection>,
}

pub fn gather_desired(
  prompt: &dyn UserPrompt,
  validator: &dyn CredentialValidator,
  profile: &PlatformProfile,
  state: &HostState,
  options: &WizardOptions,
) -> Result<WizardOutcome, WizardError> {
  let mut desired = DesiredConfig::new(options.repo_url.clone(), profile.paths.install_dir.clone());
  desired.update_repository = options.update_repository;

  let agents = ask_valid(
    prompt,
    "Agent roster (id:Name, comma separated)",
    state.config_value(keys::AGENTS).unwrap_or(DEFAULT_AGENTS),
    parse_roster,
  )?;
  desired.set_value(keys::AGENTS, agents);

  let current_port = state.config_value(keys::PORT).map(str::to_string);
  let port = ask_valid(
    prompt,
    "Bridge port",
    current_port.as_deref().unwrap_or(&DEFAULT_PORT.to_string()),
    parse_port,
  )?;
  desired.set_value(keys::PORT, port.to_string());

  let password_question = if state.config_value(keys::BRIDGE_PASSWORD).is_some() {
    "Bridge password (empty keeps the current one)"
  } else {
    "Bridge password (empty for none)"
  };
  let password = prompt.secret(password_question)?;
  if !password.is_empty() {
    desired.set_value(keys::BRIDGE_PASSWORD, password);
  }

  let mut accepted = Vec::new();
  let mut rejected = Vec::new();
  for service in OptionalService::ALL {
    let question = if state.config_value(service.config_key()).is_some() {
      format!("Update the {} integration?", service)
    } else {
      format!("Enable the {} integration?", service)
    };
    if !prompt.confirm(&question, false)? {
      continue;
    }

    let token = prompt.secret(&format!("{} bot token", service))?;
    if token.trim().is_empty() {
      info!(%service, "no token given, skipping");
      continue;
    }

    match validator.validate(service, token.trim()) {
      Ok(Validation::Accepted { identity }) => {
        info!(%service, %identity, "credential accepted");
        desired.select(service, token.trim());
        accepted.push((service, identity));
      }
      Ok(Validation::Rejected { reason }) => {
        warn!(%service, %reason, "credential rejected, skipping integration");
        rejected.push(Rejection { service, reason });
      }
      Err(e) => {
        warn!(%service, error = %e, "credential could not be checked, skipping integration");
        rejected.push(Rejection {
          service,
          reason: e.to_string(),
        });
      }
    }
  }

  let agent_registered = state.service(AGENT_UNIT) != ServiceState::Unregistered;
  let selection = UnitSelection {
    agent: prompt.confirm("Run the agent daemon as a service?", agent_registered)?,
    discovery: prompt.confirm(
      &format!("Advertise the bridge on the local network ({})?", DISCOVERY_SERVICE_TYPE),
      true,
    )?,
    port,
  };
  desired.units = managed_units(profile, &selection);
  if selection.discovery {
    desired.packages = discovery_packages(profile);
  }

  let any_registered = desired
    .units
    .iter()
    .any(|unit| state.service(&unit.name) != ServiceState::Unregistered);
  if any_registered {
    desired.recreate_services = prompt.confirm("Recreate existing service units if they changed?", false)?;
  }

  Ok(WizardOutcome {
    desired,
    accepted,
    rejected,
  })
}

/// Ask until `parse` accepts the answer, giving up after a few tries.
fn ask_valid<T>(
  prompt: &dyn UserPrompt,
  question: &str,
  default: &str,
  parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, WizardError> {
  let mut last_reason = String::new();
  for _ in 0..MAX_ATTEMPTS {
    let answer = prompt.input(question, default)?;
    match parse(answer.trim()) {
      Ok(value) => return Ok(value),
      Err(reason) => {
        warn!(question, %reason, "invalid answer");
        last_reason = reason;
      }
    }
  }
  Err(WizardError::InvalidAnswer {
    question: question.to_string(),
    reason: last_reason,
  })
}

/// Normalise an `id:Name,id:Name` roster.
pub fn parse_roster(input: &str) -> Result<String, String> {
  let mut entries = Vec::new();
  for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
    let (id, name) = entry
      .split_once(':')
      .ok_or_else(|| format!("{:?} is not in id:Name form", entry))?;
    let (id, name) = (id.trim(), name.trim());
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
      return Err(format!("{:?} is not a valid agent id", id));
    }
    if name.is_empty() {
      return Err(format!("agent {:?} has no name", id));
    }
    entries.push(format!("{}:{}", id, name));
  }

  if entries.is_empty() {
    return Err("at least one agent is required".to_string());
  }
  Ok(entries.join(","))
}

pub fn parse_port(input: &str) -> Result<u16, String> {
  match input.parse::<u16>() {
    Ok(0) | Err(_) => Err(format!("{:?} is not a port between 1 and 65535", input)),
    Ok(port) => Ok(port),
  }
}
