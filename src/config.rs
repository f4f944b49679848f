//! Server configuration, resolved from CLI flags with environment fallbacks.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use clap::Args;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid port number: {0}. Must be between 1 and 65535")]
    InvalidPort(u16),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

/// Flags for the `serve` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, env = "SAVINGS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "SAVINGS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "SAVINGS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub log_level: LogLevel,
}

pub fn build_config(args: &ServeArgs) -> Result<ServerConfig, ConfigError> {
    if args.port == 0 {
        return Err(ConfigError::InvalidPort(args.port));
    }
    let log_level = args.log_level.parse()?;
    let addr = format!("{}:{}", args.host.trim(), args.port)
        .parse::<SocketAddr>()
        .map_err(|_| ConfigError::InvalidAddress(args.host.clone()))?;

    Ok(ServerConfig { addr, log_level })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(host: &str, port: u16, log_level: &str) -> ServeArgs {
        ServeArgs {
            host: host.to_string(),
            port,
            log_level: log_level.to_string(),
        }
    }

    #[test]
    fn builds_config_from_flags() {
        let config = build_config(&args("127.0.0.1", 3000, "DEBUG")).expect("valid config");
        assert_eq!(config.addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn rejects_port_zero() {
        let err = build_config(&args("0.0.0.0", 0, "info")).expect_err("port 0 is invalid");
        assert_eq!(err, ConfigError::InvalidPort(0));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = build_config(&args("0.0.0.0", 8080, "loud")).expect_err("bad level");
        assert_eq!(err, ConfigError::InvalidLogLevel("loud".to_string()));
    }

    #[test]
    fn rejects_unparseable_host() {
        let err = build_config(&args("not a host", 8080, "info")).expect_err("bad host");
        assert!(matches!(err, ConfigError::InvalidAddress(_)));
    }
}
