//! Configuration management for the P&L guard.
//!
//! Loads settings from an optional config file, environment variables and
//! command line overrides, in increasing order of precedence.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Paradex API access
    #[serde(default)]
    pub paradex: ParadexConfig,
    /// Telegram delivery settings
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Polling cadence and alert thresholds
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParadexConfig {
    /// JWT used as a bearer token
    #[serde(default)]
    pub jwt: String,
    /// REST base URL (without trailing slash)
    #[serde(default = "default_paradex_url")]
    pub api_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff, in seconds
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    #[serde(default)]
    pub bot_token: String,
    /// Destination chat
    #[serde(default)]
    pub chat_id: String,
    /// Bot API base URL (without trailing slash)
    #[serde(default = "default_telegram_url")]
    pub api_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Target cycle cadence in seconds (must be > 0)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Alert when total unrealized P&L is at or above this value
    #[serde(default = "default_upper_threshold")]
    pub upper_threshold: Decimal,
    /// Alert when total unrealized P&L is at or below this value
    #[serde(default = "default_lower_threshold")]
    pub lower_threshold: Decimal,
    /// Trade reminder interval in seconds (0 = disabled)
    #[serde(default = "default_reminder_interval")]
    pub reminder_interval_secs: u64,
    /// Pause after a failed cycle, in seconds
    #[serde(default = "default_error_cooldown")]
    pub error_cooldown_secs: u64,
}

/// Values supplied on the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub jwt: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub upper_threshold: Option<Decimal>,
    pub lower_threshold: Option<Decimal>,
    /// Signed so a negative value can be reported and clamped
    pub reminder_interval_secs: Option<i64>,
}

// Default value functions
fn default_paradex_url() -> String {
    "https://api.prod.paradex.trade/v1".to_string()
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3 // 4 attempts in total
}

fn default_backoff_factor() -> u64 {
    1 // 1s, 2s, 4s
}

fn default_poll_interval() -> u64 {
    60
}

fn default_upper_threshold() -> Decimal {
    Decimal::new(20, 0) // +20 USDC
}

fn default_lower_threshold() -> Decimal {
    Decimal::new(-20, 0) // -20 USDC
}

fn default_reminder_interval() -> u64 {
    3600
}

fn default_error_cooldown() -> u64 {
    5
}

impl Config {
    /// Load configuration from config files, environment variables and
    /// command line overrides.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("PNLG"))
            .set_override_option("paradex.jwt", std::env::var("PARADEX_JWT").ok())?
            .set_override_option("telegram.bot_token", std::env::var("TG_BOT_TOKEN").ok())?
            .set_override_option("telegram.chat_id", std::env::var("TG_CHAT_ID").ok())?
            .build()
            .context("Failed to build configuration")?;

        let mut loaded: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        loaded.apply_overrides(overrides);

        Ok(loaded)
    }

    /// Apply command line values on top of the loaded configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(jwt) = &overrides.jwt {
            self.paradex.jwt = jwt.clone();
        }
        if let Some(interval) = overrides.poll_interval_secs {
            self.monitor.poll_interval_secs = interval;
        }
        if let Some(upper) = overrides.upper_threshold {
            self.monitor.upper_threshold = upper;
        }
        if let Some(lower) = overrides.lower_threshold {
            self.monitor.lower_threshold = lower;
        }
        if let Some(reminder) = overrides.reminder_interval_secs {
            self.monitor.reminder_interval_secs = if reminder < 0 {
                warn!(
                    value = reminder,
                    "Invalid trade reminder interval, resetting to 0 (disabled)"
                );
                0
            } else {
                reminder as u64
            };
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.paradex.jwt.trim().is_empty(),
            "JWT must be provided via --jwt or PARADEX_JWT"
        );

        anyhow::ensure!(
            !self.telegram.bot_token.trim().is_empty() && !self.telegram.chat_id.trim().is_empty(),
            "TG_BOT_TOKEN and TG_CHAT_ID must be set"
        );

        anyhow::ensure!(
            self.monitor.poll_interval_secs > 0,
            "poll_interval_secs must be greater than 0"
        );

        anyhow::ensure!(
            self.monitor.upper_threshold >= self.monitor.lower_threshold,
            "upper_threshold ({}) must be >= lower_threshold ({})",
            self.monitor.upper_threshold,
            self.monitor.lower_threshold
        );

        anyhow::ensure!(
            self.paradex.request_timeout_secs > 0 && self.telegram.request_timeout_secs > 0,
            "request timeouts must be greater than 0"
        );

        Ok(())
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// `None` when reminders are disabled.
    pub fn reminder_interval(&self) -> Option<Duration> {
        (self.reminder_interval_secs > 0).then(|| Duration::from_secs(self.reminder_interval_secs))
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paradex: ParadexConfig::default(),
            telegram: TelegramConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Default for ParadexConfig {
    fn default() -> Self {
        Self {
            jwt: String::new(),
            api_url: default_paradex_url(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            backoff_factor_secs: default_backoff_factor(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_url: default_telegram_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            upper_threshold: default_upper_threshold(),
            lower_threshold: default_lower_threshold(),
            reminder_interval_secs: default_reminder_interval(),
            error_cooldown_secs: default_error_cooldown(),
        }
    }
}
