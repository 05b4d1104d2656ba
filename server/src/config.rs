use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::state::Liveness;

const DEFAULT_CONFIG_PATH: &str = "./signaling.toml";

/// Command-line flags. Every setting is optional so that an unset flag never
/// masks a value coming from the TOML file or the environment.
#[derive(Parser, Serialize, Debug, Default, Clone)]
#[command(name = "signaling-server", version, about = "Room signaling server")]
pub struct Cli {
    /// Path to TOML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    #[serde(skip)]
    pub config: String,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Allowed CORS origin ("*" for any)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_origin: Option<String>,

    /// Enable structured JSON logging
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_logs: Option<bool>,

    /// Mount the /v1/rooms introspection routes
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_endpoints: Option<bool>,

    /// Seconds between server pings
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_interval_secs: Option<u64>,

    /// Seconds to wait for a pong before closing
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pong_timeout_secs: Option<u64>,
}

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to listen on (default: 5000)
    pub port: u16,
    /// Bind address (default: 0.0.0.0)
    pub bind_address: String,
    /// Allowed CORS origin, "*" for any (default: "*")
    pub client_origin: String,
    /// Structured JSON logging for Docker/production (default: false)
    pub json_logs: bool,
    /// Expose read-only room introspection under /v1/rooms (default: true)
    pub debug_endpoints: bool,
    /// Server ping cadence in seconds (default: 30)
    pub ping_interval_secs: u64,
    /// Pong deadline in seconds (default: 10)
    pub pong_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_address: "0.0.0.0".to_string(),
            client_origin: "*".to_string(),
            json_logs: false,
            debug_endpoints: true,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (SIGNALING_*) < CLI args
    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        Self::figment(cli).extract()
    }

    pub fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("SIGNALING_"))
            .merge(Serialized::defaults(cli))
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            ping_interval: Duration::from_secs(self.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs.max(1)),
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Signaling Server Configuration
# Place this file at ./signaling.toml or specify with --config <path>
# All settings can be overridden via environment variables (SIGNALING_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 5000)
# port = 5000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Allowed CORS origin for browser clients, "*" for any (default: "*")
# client_origin = "*"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Expose read-only room introspection at /v1/rooms (do not expose publicly)
# debug_endpoints = true

# ---- WebSocket liveness ----
# Seconds between server pings (default: 30)
# ping_interval_secs = 30
# Seconds to wait for a pong before dropping the connection (default: 10)
# pong_timeout_secs = 10
"#
    .to_string()
}
