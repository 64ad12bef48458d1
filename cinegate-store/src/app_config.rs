use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    pub payment_topic: String,
    pub showtime_topic: String,
    pub confirmation_topic: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BusinessRules {
    #[serde(default = "default_hold")]
    pub booking_hold_seconds: u64,
    #[serde(default = "default_max_seats")]
    pub max_seats_per_booking: usize,
    #[serde(default = "default_sweep_interval")]
    pub expiry_sweep_interval_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub expiry_batch_size: i64,
    #[serde(default = "default_grace")]
    pub expiry_grace_seconds: u64,
}

fn default_hold() -> u64 { 900 }
fn default_max_seats() -> usize { 10 }
fn default_sweep_interval() -> u64 { 30 }
fn default_batch_size() -> i64 { 100 }
fn default_grace() -> u64 { 5 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            booking_hold_seconds: default_hold(),
            max_seats_per_booking: default_max_seats(),
            expiry_sweep_interval_seconds: default_sweep_interval(),
            expiry_batch_size: default_batch_size(),
            expiry_grace_seconds: default_grace(),
        }
    }
}

/// Upper bound for the hold and grace windows, one week
const MAX_WINDOW_SECONDS: u64 = 7 * 24 * 60 * 60;

fn window(seconds: u64) -> chrono::Duration {
    // Bounded by MAX_WINDOW_SECONDS, so the conversion cannot fail
    let bounded = i64::try_from(seconds.min(MAX_WINDOW_SECONDS)).unwrap_or_default();
    chrono::Duration::try_seconds(bounded).unwrap_or_else(chrono::Duration::zero)
}

impl BusinessRules {
    /// Reject values the engines cannot run with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let invalid = |msg: String| Err(config::ConfigError::Message(msg));
        if self.booking_hold_seconds == 0 || self.booking_hold_seconds > MAX_WINDOW_SECONDS {
            return invalid(format!(
                "business_rules.booking_hold_seconds must be between 1 and {MAX_WINDOW_SECONDS}, got {}",
                self.booking_hold_seconds
            ));
        }
        if self.expiry_grace_seconds > MAX_WINDOW_SECONDS {
            return invalid(format!(
                "business_rules.expiry_grace_seconds must be at most {MAX_WINDOW_SECONDS}, got {}",
                self.expiry_grace_seconds
            ));
        }
        if self.max_seats_per_booking == 0 {
            return invalid("business_rules.max_seats_per_booking must be at least 1".into());
        }
        if self.expiry_batch_size <= 0 {
            return invalid(format!(
                "business_rules.expiry_batch_size must be positive, got {}",
                self.expiry_batch_size
            ));
        }
        Ok(())
    }

    pub fn booking_hold(&self) -> chrono::Duration {
        window(self.booking_hold_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_seconds.max(1))
    }

    pub fn expiry_grace(&self) -> chrono::Duration {
        window(self.expiry_grace_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CINEGATE_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("CINEGATE").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.business_rules.validate()?;
        Ok(config)
    }
}
