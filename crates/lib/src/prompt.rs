//! Interactive questions as an injected capability.
//!
//! The wizard only talks to a [`UserPrompt`]. The CLI supplies a terminal
//! implementation; tests supply [`ScriptedPrompt`].

use std::cell::RefCell;
use std::collections::VecDeque;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
  #[error("prompt cancelled")]
  Cancelled,

  #[error("no scripted answer left for {0:?}")]
  Exhausted(String),

  #[error("prompt failed: {0}")]
  Io(String),
}

/// Blocking questions to the person running the installer.
pub trait UserPrompt {
  /// Free-text answer; an empty answer yields `default`.
  fn input(&self, question: &str, default: &str) -> Result<String, PromptError>;

  /// Hidden answer; may be empty.
  fn secret(&self, question: &str) -> Result<String, PromptError>;

  fn confirm(&self, question: &str, default: bool) -> Result<bool, PromptError>;
}

/// Accepts every default without asking. Secrets are left empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultsPrompt;

impl UserPrompt for DefaultsPrompt {
  fn input(&self, _question: &str, default: &str) -> Result<String, PromptError> {
    Ok(default.to_string())
  }

  fn secret(&self, _question: &str) -> Result<String, PromptError> {
    Ok(String::new())
  }

  fn confirm(&self, _question: &str, default: bool) -> Result<bool, PromptError> {
    Ok(default)
  }
}

/// One scripted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
  /// Text for `input` or `secret`. Empty text means "take the default".
  Text(String),
  Yes,
  No,
  /// Take the default of a `confirm`.
  Default,
}

/// Replays answers in order and records the questions asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
  answers: RefCell<VecDeque<Answer>>,
  asked: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
  pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
    Self {
      answers: RefCell::new(answers.into_iter().collect()),
      asked: RefCell::new(Vec::new()),
    }
  }

  pub fn asked(&self) -> Vec<String> {
    self.asked.borrow().clone()
  }

  pub fn remaining(&self) -> usize {
    self.answers.borrow().len()
  }

  fn next(&self, question: &str) -> Result<Answer, PromptError> {
    self.asked.borrow_mut().push(question.to_string());
    self
      .answers
      .borrow_mut()
      .pop_front()
      .ok_or_else(|| PromptError::Exhausted(question.to_string()))
  }
}

impl UserPrompt for ScriptedPrompt {
  fn input(&self, question: &str, default: &str) -> Result<String, PromptError> {
    match self.next(question)? {
      Answer::Text(text) if !text.is_empty() => Ok(text),
      _ => Ok(default.to_string()),
    }
  }

  fn secret(&self, question: &str) -> Result<String, PromptError> {
    match self.next(question)? {
      Answer::Text(text) => Ok(text),
      _ => Ok(String::new()),
    }
  }

  fn confirm(&self, question: &str, default: bool) -> Result<bool, PromptError> {
    match self.next(question)? {
      Answer::Yes => Ok(true),
      Answer::No => Ok(false),
      _ => Ok(default),
    }
  }
}
