//! Credential checks against the messaging APIs.
//!
//! Each integration exposes a cheap authenticated GET that reports whether a
//! token is valid: Telegram `getMe`, Discord `users/@me`, Slack `auth.test`.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::plan::OptionalService;

/// How long a credential check may take before it counts as failed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CredentialError {
  #[error("credential is empty")]
  Empty,

  #[error("failed to reach {service}: {source}")]
  Http {
    service: OptionalService,
    #[source]
    source: reqwest::Error,
  },
}

/// Verdict of the remote API on a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
  /// Accepted; `identity` is the bot or workspace name the API reported.
  Accepted { identity: String },
  Rejected { reason: String },
}

impl Validation {
  pub fn is_accepted(&self) -> bool {
    matches!(self, Validation::Accepted { .. })
  }
}

pub trait CredentialValidator {
  fn validate(&self, service: OptionalService, token: &str) -> Result<Validation, CredentialError>;
}

/// Validates tokens over HTTPS with a blocking client.
pub struct HttpValidator {
  client: reqwest::blocking::Client,
}

impl HttpValidator {
  pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("clawup/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client })
  }

  fn request(&self, service: OptionalService, token: &str) -> reqwest::blocking::RequestBuilder {
    match service {
      OptionalService::Telegram => self.client.get(format!("https://api.telegram.org/bot{token}/getMe")),
      OptionalService::Discord => self
        .client
        .get("https://discord.com/api/v10/users/@me")
        .header("Authorization", format!("Bot {token}")),
      OptionalService::Slack => self.client.get("https://slack.com/api/auth.test").bearer_auth(token),
    }
  }
}

impl CredentialValidator for HttpValidator {
  fn validate(&self, service: OptionalService, token: &str) -> Result<Validation, CredentialError> {
    let token = token.trim();
    if token.is_empty() {
      return Err(CredentialError::Empty);
    }

    let response = self
      .request(service, token)
      .send()
      .map_err(|source| http_error(service, source))?;
    let status = response.status();
    // Error bodies are often not JSON; that alone is not a transport failure.
    let body: Value = response.json().unwrap_or(Value::Null);
    debug!(%service, %status, "credential check answered");

    Ok(interpret(service, status.is_success(), status.as_u16(), &body))
  }
}

/// Telegram carries the token in the URL path, so the URL never reaches messages.
fn http_error(service: OptionalService, source: reqwest::Error) -> CredentialError {
  CredentialError::Http {
    service,
    source: source.without_url(),
  }
}

/// Turn an API answer into a [`Validation`].
fn interpret(service: OptionalService, success: bool, status: u16, body: &Value) -> Validation {
  let str_at = |path: &[&str]| -> Option<String> {
    let mut value = body;
    for key in path {
      value = value.get(key)?;
    }
    value.as_str().map(str::to_string)
  };
  let ok_flag = body.get("ok").and_then(Value::as_bool).unwrap_or(false);

  let accepted = match service {
    OptionalService::Telegram if success && ok_flag => str_at(&["result", "username"]).map(|name| format!("@{}", name)),
    OptionalService::Discord if success => str_at(&["username"]),
    OptionalService::Slack if success && ok_flag => str_at(&["team"]),
    _ => None,
  };

  if let Some(identity) = accepted {
    return Validation::Accepted { identity };
  }
  if success && (ok_flag || service == OptionalService::Discord) {
    return Validation::Accepted {
      identity: "unknown".to_string(),
    };
  }

  let reason = str_at(&["description"])
    .or_else(|| str_at(&["message"]))
    .or_else(|| str_at(&["error"]))
    .unwrap_or_else(|| format!("HTTP {}", status));
  Validation::Rejected { reason }
}
