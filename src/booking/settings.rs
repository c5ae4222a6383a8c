//! Settings that gate which flow branches are reachable.
//!
//! Loading never fails: missing or unreadable values fall back to defaults
//! that keep checkout open.

use tracing::warn;

use super::providers::SettingsProvider;

pub const FLEXIBLE_PAYMENT_KEY: &str = "flexible_payment_enabled";
pub const GRACE_PERIOD_KEY: &str = "payment_grace_period_days";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    pub flexible_payment_enabled: bool,
    pub grace_period_days: u32,
}

impl FlowSettings {
    pub fn with_grace_period(grace_period_days: u32) -> Self {
        Self {
            flexible_payment_enabled: true,
            grace_period_days,
        }
    }

    /// Load settings, keeping `defaults` for anything that fails
    pub async fn load(provider: &dyn SettingsProvider, defaults: FlowSettings) -> Self {
        let mut settings = defaults;

        match provider.get_flag(FLEXIBLE_PAYMENT_KEY).await {
            Ok(Some(value)) => match parse_bool(&value) {
                Some(enabled) => settings.flexible_payment_enabled = enabled,
                None => warn!("Ignoring invalid {} value '{}'", FLEXIBLE_PAYMENT_KEY, value),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to load {}, keeping default: {}", FLEXIBLE_PAYMENT_KEY, e),
        }

        match provider.get_flag(GRACE_PERIOD_KEY).await {
            Ok(Some(value)) => match value.trim().parse::<u32>() {
                Ok(days) => settings.grace_period_days = days,
                Err(_) => warn!("Ignoring invalid {} value '{}'", GRACE_PERIOD_KEY, value),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to load {}, keeping default: {}", GRACE_PERIOD_KEY, e),
        }

        settings
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::with_grace_period(7)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
