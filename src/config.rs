//! Server configuration.
//!
//! Every option can be given on the command line or through the environment
//! variable shown in `--help`. Options left unset take the default of the
//! selected environment profile:
//!
//! | Option              | development   | production          |
//! |---------------------|---------------|---------------------|
//! | host                | 127.0.0.1     | 0.0.0.0             |
//! | password            | `password`    | required            |
//! | encryption          | off           | on (key required)   |
//! | periodic dumps      | off, 60s      | on, 300s            |
//! | restore at start    | off           | on                  |
//! | debug logging       | on            | off                 |
//! | max connections     | unlimited     | 1000                |

use crate::crypto::KEY_SIZE;
use crate::storage::{default_shard_count, EngineOptions, SnapshotConfig, DEFAULT_DUMP_DIR};
use clap::builder::BoolishValueParser;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5555;

/// Password used by the development profile when none is configured.
const DEV_PASSWORD: &str = "password";

/// Deployment profile selecting the defaults for unset options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Testing => "testing",
        };
        f.write_str(name)
    }
}

/// Command-line and environment options, before profile defaults.
#[derive(Debug, Parser)]
#[command(name = "jsonkv", version, about = "In-memory sharded JSON key-value store")]
pub struct Cli {
    /// Deployment profile.
    #[arg(long, env = "ENVIRONMENT", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// Host to bind to.
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Password every client must send with AUTH.
    #[arg(long, env = "SERVER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Encrypt stored values with AES-256-CTR.
    #[arg(long, env = "ENABLE_ENCRYPTION", num_args = 0..=1, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub enable_encryption: Option<bool>,

    /// 32-byte encryption key.
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Periodically dump memory to disk.
    #[arg(long, env = "DUMP_MEMORY_ON", num_args = 0..=1, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub dump_memory: Option<bool>,

    /// Seconds between dumps.
    #[arg(long, env = "DUMP_MEMORY_EVERY_SECOND")]
    pub dump_interval: Option<u64>,

    /// Restore the dump file before accepting connections.
    #[arg(long, env = "RESTORE_MEMORY_DUMP_AT_START", num_args = 0..=1,
          default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub restore_at_start: Option<bool>,

    /// Directory holding the dump file.
    #[arg(long, env = "DUMP_PATH")]
    pub dump_path: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, env = "DEBUG", num_args = 0..=1, default_missing_value = "true",
          value_parser = BoolishValueParser::new())]
    pub debug: Option<bool>,

    /// Advisory connection limit (0 means unlimited).
    #[arg(long, env = "MAX_CONNECTIONS")]
    pub max_connections: Option<u64>,

    /// Number of engine shards.
    #[arg(long, env = "SHARD_COUNT")]
    pub shards: Option<usize>,
}

/// Resolved configuration.
#[derive(Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub enable_encryption: bool,
    pub encryption_key: Option<String>,
    pub dump_memory: bool,
    pub dump_interval_secs: u64,
    pub restore_at_start: bool,
    pub dump_path: PathBuf,
    pub debug: bool,
    pub max_connections: Option<u64>,
    pub shard_count: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .field("enable_encryption", &self.enable_encryption)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[REDACTED]"))
            .field("dump_memory", &self.dump_memory)
            .field("dump_interval_secs", &self.dump_interval_secs)
            .field("restore_at_start", &self.restore_at_start)
            .field("dump_path", &self.dump_path)
            .field("debug", &self.debug)
            .field("max_connections", &self.max_connections)
            .field("shard_count", &self.shard_count)
            .finish()
    }
}

/// Configuration validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port must be non-zero")]
    InvalidPort,

    #[error("server password must be set")]
    MissingPassword,

    #[error("encryption is enabled but no encryption key is set")]
    MissingEncryptionKey,

    #[error("encryption key must be {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("memory dumps are enabled but no dump path is set")]
    MissingDumpPath,

    #[error("shard count must be at least 1")]
    InvalidShardCount,
}

impl Config {
    /// Parses the process arguments and environment, then validates.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::from_cli(Cli::parse());
        config.validate()?;
        Ok(config)
    }

    /// Fills every unset option from the profile defaults.
    pub fn from_cli(cli: Cli) -> Self {
        let production = cli.environment == Environment::Production;

        let default_host = if production { "0.0.0.0" } else { "127.0.0.1" };
        let host = cli.host.unwrap_or_else(|| default_host.to_string());
        let password = cli.password.unwrap_or_else(|| {
            if production {
                String::new()
            } else {
                DEV_PASSWORD.to_string()
            }
        });
        let max_connections = match cli.max_connections {
            Some(0) => None,
            Some(n) => Some(n),
            None if production => Some(1000),
            None => None,
        };

        Self {
            environment: cli.environment,
            host,
            port: cli.port.unwrap_or(DEFAULT_PORT),
            password,
            enable_encryption: cli.enable_encryption.unwrap_or(production),
            encryption_key: cli.encryption_key,
            dump_memory: cli.dump_memory.unwrap_or(production),
            dump_interval_secs: cli
                .dump_interval
                .unwrap_or(if production { 300 } else { 60 }),
            restore_at_start: cli.restore_at_start.unwrap_or(production),
            dump_path: cli.dump_path.unwrap_or_else(|| PathBuf::from(DEFAULT_DUMP_DIR)),
            debug: cli.debug.unwrap_or(!production),
            max_connections,
            shard_count: cli.shards.unwrap_or_else(default_shard_count),
        }
    }

    /// Checks the resolved options for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingPassword);
        }
        if self.enable_encryption {
            match &self.encryption_key {
                None => return Err(ConfigError::MissingEncryptionKey),
                Some(key) if key.len() != KEY_SIZE => {
                    return Err(ConfigError::InvalidKeyLength {
                        expected: KEY_SIZE,
                        actual: key.len(),
                    })
                }
                Some(_) => {}
            }
        }
        if self.dump_memory && self.dump_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingDumpPath);
        }
        if self.shard_count == 0 {
            return Err(ConfigError::InvalidShardCount);
        }
        Ok(())
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine construction options.
    pub fn engine_options(&self) -> EngineOptions {
        let mut options = EngineOptions::default()
            .with_shard_count(self.shard_count)
            .with_dump_dir(self.dump_path.clone());
        if self.enable_encryption {
            if let Some(key) = &self.encryption_key {
                options = options.with_encryption_key(key.as_bytes());
            }
        }
        options
    }

    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig::every_secs(self.dump_interval_secs)
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
