use crate::application::DEFAULT_COMMIT_ATTEMPTS;
use crate::domain::settlement::CommissionPolicy;
use std::env;
use thiserror::Error;

/// Largest supported number of minor-unit decimal places.
pub const MAX_CURRENCY_SCALE: u32 = 8;

/// Runtime settings, read from the environment (and `.env`, when present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    pub log_level: String,
    /// Decimal places of the smallest currency unit.
    pub currency_scale: u32,
    /// How many times an operation is re-planned after a commit conflict.
    pub commit_attempts: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            currency_scale: 0,
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CARLOT_CURRENCY_SCALE must be an integer between 0 and 8, got '{0}'")]
    InvalidScale(String),
    #[error("CARLOT_COMMIT_RETRIES must be a positive integer, got '{0}'")]
    InvalidRetries(String),
}

impl MarketConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_level = lookup("CARLOT_LOG_LEVEL").unwrap_or(defaults.log_level);

        let currency_scale = match lookup("CARLOT_CURRENCY_SCALE") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|scale| *scale <= MAX_CURRENCY_SCALE)
                .ok_or(ConfigError::InvalidScale(raw))?,
            None => defaults.currency_scale,
        };

        let commit_attempts = match lookup("CARLOT_COMMIT_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or(ConfigError::InvalidRetries(raw))?,
            None => defaults.commit_attempts,
        };

        Ok(Self {
            log_level,
            currency_scale,
            commit_attempts,
        })
    }

    pub fn commission_policy(&self) -> CommissionPolicy {
        CommissionPolicy::new(self.currency_scale)
    }
}
