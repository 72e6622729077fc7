use std::io::{self, IsTerminal};

use anyhow::{Result, bail};
use dialoguer::{Confirm, Input, Password};

use clawup_lib::prompt::{DefaultsPrompt, PromptError, UserPrompt};

/// Asks on the terminal.
pub struct TerminalPrompt;

impl UserPrompt for TerminalPrompt {
  fn input(&self, question: &str, default: &str) -> Result<String, PromptError> {
    Input::<String>::new()
      .with_prompt(question)
      .default(default.to_string())
      .interact_text()
      .map_err(prompt_error)
  }

  fn secret(&self, question: &str) -> Result<String, PromptError> {
    Password::new()
      .with_prompt(question)
      .allow_empty_password(true)
      .interact()
      .map_err(prompt_error)
  }

  fn confirm(&self, question: &str, default: bool) -> Result<bool, PromptError> {
    Confirm::new()
      .with_prompt(question)
      .default(default)
      .interact()
      .map_err(prompt_error)
  }
}

fn prompt_error(e: dialoguer::Error) -> PromptError {
  match e {
    dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => PromptError::Cancelled,
    other => PromptError::Io(other.to_string()),
  }
}

pub fn is_interactive() -> bool {
  io::stdin().is_terminal() && io::stderr().is_terminal()
}

/// The terminal, or the defaults when `yes` is set.
pub fn prompt_for(yes: bool) -> Result<Box<dyn UserPrompt>> {
  if yes {
    return Ok(Box::new(DefaultsPrompt));
  }
  if !is_interactive() {
    bail!("Cannot prompt in non-interactive mode. Use --yes to accept the defaults.");
  }
  Ok(Box::new(TerminalPrompt))
}
