//! Configuration module for the shadowsocks node
//!
//! CLI arguments with environment variable fallbacks. Everything else
//! (port, cipher, users) is fetched from the panel at runtime.

use clap::{Command, CommandFactory, FromArgMatches, Parser};
use std::time::Duration;

use crate::business::TaskConfig;
use crate::error::{NodeError, Result};

/// Parse duration string (e.g., "60s", "2m", "1h") or plain seconds
fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }
    s.parse::<u64>().map(Duration::from_secs).map_err(|_| {
        format!(
            "Invalid duration '{}'. Use formats like '60s', '2m', '1h' or plain seconds",
            s
        )
    })
}

/// Unprefixed variables read by older deployments, lowest precedence
const LEGACY_ENV: [(&str, &str); 5] = [
    ("api", "API"),
    ("token", "TOKEN"),
    ("node", "NODE"),
    ("sys_interval", "SYS_INTERVAL"),
    ("log_mode", "LOG_LEVEL"),
];

/// Install legacy variables as argument defaults.
///
/// Resulting precedence: flag, then `X_PANDA_SS_*`, then legacy name,
/// then the built-in default.
fn with_legacy_env(mut cmd: Command, lookup: impl Fn(&str) -> Option<String>) -> Command {
    for (id, name) in LEGACY_ENV {
        if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
            cmd = cmd.mut_arg(id, |arg| arg.default_value(value).required(false));
        }
    }
    cmd
}

/// CLI arguments for the shadowsocks node
///
/// Supports environment variables with X_PANDA_SS_ prefix, and the
/// unprefixed API, TOKEN, NODE, SYS_INTERVAL and LOG_LEVEL as fallbacks
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Provide shadowsocks service for the v2Board panel"
)]
#[command(rename_all = "snake_case")]
pub struct CliArgs {
    /// Panel API base URL (e.g., "https://panel.example.com")
    #[arg(long, env = "X_PANDA_SS_API")]
    pub api: String,

    /// Token of the panel API
    #[arg(long, env = "X_PANDA_SS_TOKEN")]
    pub token: String,

    /// Node ID from the panel
    #[arg(long, env = "X_PANDA_SS_NODE")]
    pub node: u32,

    /// API request cycle for user sync and traffic report (e.g., "60s", "2m")
    #[arg(long = "sys_interval", env = "X_PANDA_SS_SYS_INTERVAL", default_value = "60s", value_parser = parse_duration)]
    pub sys_interval: Duration,

    /// Panel API request timeout
    #[arg(long = "api_timeout", env = "X_PANDA_SS_API_TIMEOUT", default_value = "15s", value_parser = parse_duration)]
    pub api_timeout: Duration,

    /// Log mode: debug, info, warn, error
    #[arg(long = "log_mode", env = "X_PANDA_SS_LOG_LEVEL", default_value = "error")]
    pub log_mode: String,
}

impl CliArgs {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        let cmd = with_legacy_env(Self::command(), |name| std::env::var(name).ok());
        let matches = cmd.get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    /// Validate the CLI arguments
    pub fn validate(&self) -> Result<()> {
        if self.api.is_empty() {
            return Err(NodeError::Config("panel API address is required".into()));
        }
        if !self.api.starts_with("http://") && !self.api.starts_with("https://") {
            return Err(NodeError::Config(format!(
                "panel API address must start with http:// or https://, got {}",
                self.api
            )));
        }
        if self.token.is_empty() {
            return Err(NodeError::Config("panel API token is required".into()));
        }
        if self.node == 0 {
            return Err(NodeError::Config(
                "Node ID must be a positive integer".into(),
            ));
        }
        if self.sys_interval.is_zero() {
            return Err(NodeError::Config(
                "sys_interval must be greater than 0".into(),
            ));
        }
        if self.api_timeout.is_zero() {
            return Err(NodeError::Config(
                "api_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Both periodic routines share the single sys interval
    pub fn task_config(&self) -> TaskConfig {
        TaskConfig::new(self.sys_interval, self.sys_interval)
    }
}
