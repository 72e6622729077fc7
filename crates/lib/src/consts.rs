//! Names and defaults shared across the installer.

/// Application name, used for data, state and log directories.
pub const APP_NAME: &str = "clawup";

/// Git remote of the bridge application.
pub const DEFAULT_REPO_URL: &str = "https://github.com/carclaw/carclaw-bridge.git";

/// Minimum Node.js major version the bridge runs on.
pub const DEFAULT_NODE_MAJOR: u32 = 20;

/// File whose presence marks a checkout of the bridge application.
pub const MARKER_FILE: &str = "package.json";

/// Bridge configuration file name inside the install directory.
pub const CONFIG_FILE_NAME: &str = ".env";

/// Template shipped by the bridge repository, copied on first use.
pub const CONFIG_TEMPLATE_NAME: &str = ".env.example";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_AGENTS: &str = "mini:Mini,m5:M5";

/// Zero-configuration service type advertised on the local network.
pub const DISCOVERY_SERVICE_TYPE: &str = "_carclaw._tcp";
pub const DISCOVERY_INSTANCE_NAME: &str = "CarClaw Bridge";

pub const BRIDGE_UNIT: &str = "clawup-bridge";
pub const AGENT_UNIT: &str = "clawup-agent";
pub const DISCOVERY_UNIT: &str = "clawup-discovery";

/// Every unit name the installer manages, in registration order.
pub const MANAGED_UNITS: [&str; 3] = [BRIDGE_UNIT, AGENT_UNIT, DISCOVERY_UNIT];

/// Reverse-DNS prefix for launchd labels.
pub const LAUNCHD_LABEL_PREFIX: &str = "ai.carclaw";

/// Seconds a crashed unit waits before it is restarted.
pub const RESTART_DELAY_SECS: u32 = 10;

pub mod keys {
  pub const AGENTS: &str = "AGENTS";
  pub const PORT: &str = "PORT";
  pub const BRIDGE_PASSWORD: &str = "BRIDGE_PASSWORD";
  pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
  pub const DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
  pub const SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
}

/// Whether values under `key` must never be echoed back.
pub fn is_secret_key(key: &str) -> bool {
  key.ends_with("_TOKEN") || key.ends_with("PASSWORD")
}
