use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    /// Required, with no default.
    pub grace_threshold_days: u32,
    /// Bearer secret the scheduler sends to the cron endpoints. Unchecked when unset.
    pub cron_secret: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            redis_url: try_load("REDIS_URL", "redis://redis:6379")?,
            grace_threshold_days: require("GRACE_THRESHOLD_DAYS")?,
            cron_secret: read_secret("CRON_SECRET"),
        })
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found");
    })
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            message: e.to_string(),
        }
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse(key, &raw)
}

fn require<T: FromStr>(key: &'static str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = var(key).map_err(|_| ConfigError::Missing(key))?;

    parse(key, &raw)
}

/// Docker secret file first, then a plain environment variable of the same name.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    let secret = read_to_string(&path)
        .map_err(|e| {
            info!("No secret file for {secret_name}: {e}");
        })
        .or_else(|_| env::var(secret_name))
        .ok()?
        .trim()
        .to_string();

    (!secret.is_empty()).then_some(secret)
}
