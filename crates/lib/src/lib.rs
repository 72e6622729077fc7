//! clawup-lib: convergent installer for the CarClaw bridge
//!
//! A run is a probe, plan, execute cycle:
//! - `probe`: read-only inspection of the host into a `HostState`
//! - `plan`: pure function from `HostState` + `DesiredConfig` to a `Plan`
//! - `execute`: applies a `Plan` in order, each action idempotent
//!
//! Host access goes through `host::CommandRunner`, `service::ServiceRegistrar`
//! and `config::ConfigStore`; prompts go through `prompt::UserPrompt`.

pub mod config;
pub mod consts;
pub mod credentials;
pub mod engine;
pub mod execute;
pub mod host;
pub mod plan;
pub mod platform;
pub mod probe;
pub mod prompt;
pub mod service;
#[cfg(test)]
mod util;
pub mod wizard;
