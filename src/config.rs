//! Configuration for the booking service.

use std::str::FromStr;
use std::time::Duration;

use crate::booking::{BonusDuration, FlowSettings};

/// Booking service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub database_max_connections: u32,
    /// How long farm listings and package lists stay cached
    pub catalog_cache_ttl: Duration,
    /// Checkouts untouched for this long are dropped
    pub checkout_idle: Duration,
    pub checkout_max_sessions: u64,
    /// Bonus for partners without their own bonus
    pub default_referral_bonus: BonusDuration,
    pub default_grace_period_days: u32,
    /// Currency code attached to money in responses
    pub currency: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8080)?;
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let cache_ttl_secs: u64 = parse_or(&lookup, "CATALOG_CACHE_TTL_SECS", 300)?;
        if cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("CATALOG_CACHE_TTL_SECS"));
        }

        let checkout_idle_secs: u64 = parse_or(&lookup, "CHECKOUT_IDLE_SECS", 1800)?;
        if checkout_idle_secs == 0 {
            return Err(ConfigError::Invalid("CHECKOUT_IDLE_SECS"));
        }
        let checkout_max_sessions = parse_or(&lookup, "CHECKOUT_MAX_SESSIONS", 10_000)?;

        let bonus_months = parse_or(&lookup, "DEFAULT_REFERRAL_BONUS_MONTHS", 36)?;
        let default_grace_period_days = parse_or(&lookup, "DEFAULT_GRACE_PERIOD_DAYS", 7)?;

        let currency = lookup("CURRENCY").unwrap_or_else(|| "EUR".to_string());

        Ok(Self {
            database_url,
            host,
            port,
            database_max_connections,
            catalog_cache_ttl: Duration::from_secs(cache_ttl_secs),
            checkout_idle: Duration::from_secs(checkout_idle_secs),
            checkout_max_sessions,
            default_referral_bonus: BonusDuration::from_months(bonus_months),
            default_grace_period_days,
            currency,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Flow settings used until the settings table has been read
    pub fn flow_defaults(&self) -> FlowSettings {
        FlowSettings::with_grace_period(self.default_grace_period_days)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
