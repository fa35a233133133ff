//! Environment-based configuration.
//!
//! All knobs come from the environment (with a dev-time `.env.local`
//! bootstrap in `main`); devices are a JSON array in `DEVICES` so a
//! deployment can point one binary at any fleet without a config file.

use acsync_attendance::TokenConfig;
use anyhow::{Context, Result};
use serde::Deserialize;

/// One device entry from the `DEVICES` JSON array.
#[derive(Clone, Deserialize)]
pub struct DeviceEntry {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DeviceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEntry")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Fully-resolved run configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub token: TokenConfig,
    /// Base of the attendance range-query endpoint.
    pub attendance_query_base_url: String,
    /// Full URL of the attendance submission endpoint.
    pub attendance_submit_url: String,
    /// Default trailing window when no period is given.
    pub last_days: i64,
    pub devices: Vec<DeviceEntry>,
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn string_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn int_or(name: &str, default: i64) -> Result<i64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("environment variable {name} is not an integer: '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// Parse the `DEVICES` JSON array.
pub fn parse_devices(raw: &str) -> Result<Vec<DeviceEntry>> {
    serde_json::from_str(raw).context("DEVICES is not a JSON array of {url, username, password}")
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let token = TokenConfig {
            grant_type: string_or("GRANT_TYPE", "client_credentials"),
            client_id: required("CLIENT_ID")?
                .parse()
                .context("CLIENT_ID is not an integer")?,
            client_secret: required("CLIENT_SECRET")?,
            token_url: required("TOKEN_API_URL")?,
            refresh_margin_secs: int_or("TOKEN_REFRESH_MARGIN", 60)?,
        };

        Ok(Self {
            token,
            attendance_query_base_url: required("ATTENDANCE_API_BASE_URL")?,
            attendance_submit_url: required("ATTENDANCE_API_URL")?,
            last_days: int_or("LAST_DAYS", 3)?,
            devices: parse_devices(&string_or("DEVICES", "[]"))?,
        })
    }
}
