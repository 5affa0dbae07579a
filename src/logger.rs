use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{NodeError, Result};

/// Log level accepted by `--log_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    #[default]
    Error,
}

impl LogLevel {
    /// Parse log level from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `log_mode` when present.
pub fn init_logger(log_mode: &str) -> Result<()> {
    let level = LogLevel::parse(log_mode)
        .ok_or_else(|| NodeError::Config(format!("log mode {} not supported", log_mode)))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shadowsocks_node={}", level.as_str())));

    let debug = level == LogLevel::Debug;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(debug)
                .with_line_number(debug)
                .with_ansi(true)
                .compact(),
        )
        .try_init()
        .map_err(|e| NodeError::Other(format!("failed to install logger: {}", e)))
}

pub mod log {
    pub use tracing::{debug, error, info, warn};
}
