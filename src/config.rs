//! Runtime configuration, read from the environment (and `.env` when present)

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::blockchain::chain::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};

/// A hash is 64 hex digits, so no difficulty above that can ever be met
pub const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Parameters of the ledger itself
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub difficulty: usize,
    pub mining_reward: f64,
    pub strict_pending_balance: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            strict_pending_balance: false,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::InvalidValue {
                name: "LEDGER_DIFFICULTY",
                value: self.difficulty.to_string(),
                reason: format!("must be at most {}", MAX_DIFFICULTY),
            });
        }
        if !self.mining_reward.is_finite() || self.mining_reward <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "LEDGER_MINING_REWARD",
                value: self.mining_reward.to_string(),
                reason: "must be a positive number".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mine_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            mine_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Loads `.env` if there is one, then reads the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source; unset variables
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let ledger = LedgerConfig {
            difficulty: parse_var(&lookup, "LEDGER_DIFFICULTY", defaults.ledger.difficulty)?,
            mining_reward: parse_var(&lookup, "LEDGER_MINING_REWARD", defaults.ledger.mining_reward)?,
            strict_pending_balance: parse_var(
                &lookup,
                "LEDGER_STRICT_PENDING_BALANCE",
                defaults.ledger.strict_pending_balance,
            )?,
        };
        ledger.validate()?;

        let server = ServerConfig {
            host: lookup("HOST").unwrap_or(defaults.server.host),
            port: parse_var(&lookup, "PORT", defaults.server.port)?,
            mine_timeout_secs: parse_var(&lookup, "MINE_TIMEOUT_SECS", defaults.server.mine_timeout_secs)?,
        };

        Ok(AppConfig { ledger, server })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::InvalidValue {
                name,
                reason: e.to_string(),
                value,
            })
        }
        None => Ok(default),
    }
}
