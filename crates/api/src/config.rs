//! Application configuration loaded from environment variables.

use std::time::Duration;

use secrecy::SecretString;

/// Server and pipeline configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `PAYMENT_WEBHOOK_SECRET`: HMAC secret shared with the payment
///   gateway (default: `"dev-secret"`, for local runs only)
/// - `CARRIER_BASE_URL`: carrier API root; unset means the in-memory
///   carrier gateway is used
/// - `CARRIER_EMAIL`, `CARRIER_PASSWORD`: carrier login credentials
/// - `CARRIER_PICKUP_LOCATION`: registered pickup location name
///   (default: `"Primary"`)
/// - `CARRIER_PICKUP_PINCODE`: warehouse pincode (default: `"560001"`)
/// - `CARRIER_TIMEOUT_SECS`: per-call HTTP timeout (default: `30`)
/// - `LABEL_RETRY_ATTEMPTS`: label generation attempts (default: `5`)
/// - `LABEL_RETRY_BASE_MS`: base retry delay in ms (default: `5000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub payment_webhook_secret: SecretString,
    pub carrier_base_url: Option<String>,
    pub carrier_email: String,
    pub carrier_password: SecretString,
    pub carrier_pickup_location: String,
    pub carrier_pickup_pincode: String,
    pub carrier_timeout: Duration,
    pub label_retry_attempts: u32,
    pub label_retry_base: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000),
            log_level: env_or("RUST_LOG", "info"),
            payment_webhook_secret: SecretString::from(env_or(
                "PAYMENT_WEBHOOK_SECRET",
                "dev-secret",
            )),
            carrier_base_url: std::env::var("CARRIER_BASE_URL").ok(),
            carrier_email: env_or("CARRIER_EMAIL", ""),
            carrier_password: SecretString::from(env_or("CARRIER_PASSWORD", "")),
            carrier_pickup_location: env_or("CARRIER_PICKUP_LOCATION", "Primary"),
            carrier_pickup_pincode: env_or("CARRIER_PICKUP_PINCODE", "560001"),
            carrier_timeout: Duration::from_secs(env_parse("CARRIER_TIMEOUT_SECS", 30)),
            label_retry_attempts: env_parse("LABEL_RETRY_ATTEMPTS", 5),
            label_retry_base: Duration::from_millis(env_parse("LABEL_RETRY_BASE_MS", 5000)),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            payment_webhook_secret: SecretString::from("dev-secret"),
            carrier_base_url: None,
            carrier_email: String::new(),
            carrier_password: SecretString::from(""),
            carrier_pickup_location: "Primary".to_string(),
            carrier_pickup_pincode: "560001".to_string(),
            carrier_timeout: Duration::from_secs(30),
            label_retry_attempts: 5,
            label_retry_base: Duration::from_millis(5000),
        }
    }
}
