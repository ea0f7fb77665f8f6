//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (empty = any)
    pub client_origins: Vec<String>,

    /// Arena settings handed to the match task
    pub arena: ArenaConfig,
}

/// Per-match tunables
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Half the side length of the square arena, in meters
    pub half_size: f32,
    /// Seed for deterministic obstacle generation
    pub level_seed: u64,
    /// Optional JSON overlay of script-defined obstacles
    pub obstacles_path: Option<PathBuf>,
    /// Optional JSON weapon table replacing the built-in catalog
    pub weapons_path: Option<PathBuf>,
    /// Honor `devSetLoadout` messages
    pub dev_commands: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            half_size: 40.0,
            level_seed: 1337,
            obstacles_path: None,
            weapons_path: None,
            dev_commands: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let client_origins = env::var("CLIENT_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty() && *s != "*")
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let defaults = ArenaConfig::default();
        let half_size: f32 = parse_or("ARENA_HALF", defaults.half_size)?;
        if !(half_size.is_finite() && half_size >= 10.0) {
            return Err(ConfigError::Invalid("ARENA_HALF"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origins,

            arena: ArenaConfig {
                half_size,
                level_seed: parse_or("LEVEL_SEED", defaults.level_seed)?,
                obstacles_path: env::var("OBSTACLES_PATH").ok().map(PathBuf::from),
                weapons_path: env::var("WEAPONS_PATH").ok().map(PathBuf::from),
                dev_commands: parse_or("DEV_COMMANDS", defaults.dev_commands)?,
            },
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
