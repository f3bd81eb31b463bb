//! Configuration module for the pakket server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::runtime::{Address, AddressParseError, ListenerOptions};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the demo server
#[derive(Parser, Debug)]
#[command(name = "pakket")]
#[command(author = "pakket authors")]
#[command(version = "0.1.0")]
#[command(about = "HTTP-style demo server on the pakket socket framework", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:1234)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Transports to serve on
    #[arg(short = 't', long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Number of worker threads per listener
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Size of the single read per connection or datagram, in bytes
    #[arg(short = 'm', long)]
    pub max_message_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Which listeners to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Tcp,
    Udp,
    Both,
}

impl TransportKind {
    pub fn tcp(&self) -> bool {
        matches!(self, TransportKind::Tcp | TransportKind::Both)
    }

    pub fn udp(&self) -> bool {
        matches!(self, TransportKind::Udp | TransportKind::Both)
    }
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub transport: TransportKind,
    /// Worker threads per listener
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Bound on the initial TCP read; unset or 0 blocks
    pub read_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            transport: TransportKind::default(),
            workers: default_workers(),
            backlog: default_backlog(),
            max_message_size: default_max_message_size(),
            read_timeout_ms: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:1234".to_string()
}

fn default_workers() -> usize {
    10
}

fn default_backlog() -> i32 {
    100
}

fn default_max_message_size() -> usize {
    8 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: Address,
    pub transport: TransportKind,
    pub workers: usize,
    pub backlog: i32,
    pub max_message_size: usize,
    pub read_timeout: Option<Duration>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence)
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        Ok(Config {
            listen: listen.parse()?,
            transport: cli.transport.unwrap_or(toml_config.server.transport),
            workers: cli.workers.unwrap_or(toml_config.server.workers).max(1),
            backlog: toml_config.server.backlog,
            max_message_size: cli
                .max_message_size
                .unwrap_or(toml_config.server.max_message_size)
                .max(1),
            read_timeout: toml_config
                .server
                .read_timeout_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }

    /// Per-listener settings.
    pub fn listener_options(&self) -> ListenerOptions {
        ListenerOptions {
            workers: self.workers,
            buffer_size: self.max_message_size,
            backlog: self.backlog,
            read_timeout: self.read_timeout,
            ..ListenerOptions::default()
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid listen address: {0}")]
    InvalidAddress(#[from] AddressParseError),
}
