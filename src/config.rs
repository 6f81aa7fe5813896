//! Process configuration, read once from the environment at startup.

use crate::error::ConfigError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_ASSET_ID: &str = "usd-coin";
const DEFAULT_ASSET_SYMBOL: &str = "USDC";
const DEFAULT_QUOTE_CURRENCY: &str = "usd";
const DEFAULT_PEG_PRICE: f64 = 1.00;
const DEFAULT_THRESHOLD_PERCENT: f64 = 0.5;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_LOG_FILE: &str = "stablecoin_monitor.log";

#[derive(Debug, Clone)]
pub struct Config {
    /// Provider id of the tracked asset, e.g. `usd-coin`.
    pub asset_id: String,
    /// Human-facing ticker used in logs and alerts.
    pub asset_symbol: String,
    pub quote_currency: String,
    pub peg_price: f64,
    pub threshold_percent: f64,
    pub poll_interval: Duration,
    pub price_api_url: String,
    pub request_timeout: Duration,
    pub notifier: NotifierConfig,
}

#[derive(Clone)]
pub struct NotifierConfig {
    pub sender: Option<String>,
    pub password: Option<String>,
    pub recipient: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("sender", &self.sender)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("recipient", &self.recipient)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

impl NotifierConfig {
    /// Names of the required fields that are absent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("EMAIL_SENDER", &self.sender),
            ("EMAIL_PASSWORD", &self.password),
            ("EMAIL_RECIPIENT", &self.recipient),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| key)
        .collect()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let asset_id = get("STABLECOIN_ID").unwrap_or_else(|| DEFAULT_ASSET_ID.to_string());
        let peg_price = parse_or("TARGET_PRICE", get("TARGET_PRICE"), DEFAULT_PEG_PRICE)?;
        let threshold_percent = parse_or(
            "THRESHOLD_PERCENT",
            get("THRESHOLD_PERCENT"),
            DEFAULT_THRESHOLD_PERCENT,
        )?;
        let poll_secs = parse_or(
            "CHECK_INTERVAL",
            get("CHECK_INTERVAL"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let timeout_secs = parse_or(
            "REQUEST_TIMEOUT",
            get("REQUEST_TIMEOUT"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let smtp_port = parse_or("SMTP_PORT", get("SMTP_PORT"), DEFAULT_SMTP_PORT)?;

        if !(peg_price.is_finite() && peg_price > 0.0) {
            return Err(invalid("TARGET_PRICE", peg_price, "must be a positive number"));
        }
        if !(threshold_percent.is_finite() && threshold_percent >= 0.0) {
            return Err(invalid(
                "THRESHOLD_PERCENT",
                threshold_percent,
                "must be zero or a positive number",
            ));
        }
        if poll_secs == 0 {
            return Err(invalid("CHECK_INTERVAL", poll_secs, "must be greater than zero"));
        }
        if timeout_secs == 0 {
            return Err(invalid("REQUEST_TIMEOUT", timeout_secs, "must be greater than zero"));
        }

        Ok(Self {
            asset_id,
            asset_symbol: get("STABLECOIN_SYMBOL")
                .unwrap_or_else(|| DEFAULT_ASSET_SYMBOL.to_string()),
            quote_currency: get("QUOTE_CURRENCY")
                .unwrap_or_else(|| DEFAULT_QUOTE_CURRENCY.to_string()),
            peg_price,
            threshold_percent,
            poll_interval: Duration::from_secs(poll_secs),
            price_api_url: get("PRICE_API_URL")
                .unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            notifier: NotifierConfig {
                sender: get("EMAIL_SENDER"),
                password: get("EMAIL_PASSWORD"),
                recipient: get("EMAIL_RECIPIENT"),
                smtp_host: get("SMTP_SERVER").unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
                smtp_port,
            },
        })
    }
}

/// Log file location; resolved before the rest of the config so that
/// configuration errors are logged too.
pub fn log_file() -> PathBuf {
    log_file_from_lookup(|key| std::env::var(key).ok())
}

pub fn log_file_from_lookup<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("LOG_FILE")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: impl fmt::Display, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.asset_id, "usd-coin");
        assert_eq!(config.asset_symbol, "USDC");
        assert_eq!(config.quote_currency, "usd");
        assert_eq!(config.peg_price, 1.0);
        assert_eq!(config.threshold_percent, 0.5);
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.price_api_url, "https://api.coingecko.com/api/v3");
        assert_eq!(config.notifier.smtp_host, "smtp.gmail.com");
        assert_eq!(config.notifier.smtp_port, 587);
        assert_eq!(
            config.notifier.missing_fields(),
            vec!["EMAIL_SENDER", "EMAIL_PASSWORD", "EMAIL_RECIPIENT"]
        );
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("STABLECOIN_ID", "tether"),
            ("STABLECOIN_SYMBOL", "USDT"),
            ("TARGET_PRICE", "1.0"),
            ("THRESHOLD_PERCENT", "0"),
            ("CHECK_INTERVAL", "60"),
            ("SMTP_PORT", "2525"),
            ("EMAIL_SENDER", "bot@example.com"),
            ("EMAIL_PASSWORD", "hunter2"),
            ("EMAIL_RECIPIENT", "ops@example.com"),
        ])
        .unwrap();

        assert_eq!(config.asset_id, "tether");
        assert_eq!(config.asset_symbol, "USDT");
        assert_eq!(config.threshold_percent, 0.0);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.notifier.smtp_port, 2525);
        assert!(config.notifier.missing_fields().is_empty());
    }

    #[test]
    fn test_blank_notifier_fields_are_missing() {
        let config = config_from(&[
            ("EMAIL_SENDER", "bot@example.com"),
            ("EMAIL_PASSWORD", "   "),
            ("EMAIL_RECIPIENT", ""),
        ])
        .unwrap();

        assert_eq!(
            config.notifier.missing_fields(),
            vec!["EMAIL_PASSWORD", "EMAIL_RECIPIENT"]
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            ("CHECK_INTERVAL", "0"),
            ("CHECK_INTERVAL", "soon"),
            ("THRESHOLD_PERCENT", "-0.1"),
            ("THRESHOLD_PERCENT", "NaN"),
            ("TARGET_PRICE", "0"),
            ("TARGET_PRICE", "-1"),
            ("SMTP_PORT", "70000"),
            ("REQUEST_TIMEOUT", "0"),
        ];

        for (key, value) in cases {
            match config_from(&[(key, value)]) {
                Err(ConfigError::Invalid { key: k, .. }) => assert_eq!(k, key),
                Ok(_) => panic!("{}={} should be rejected", key, value),
            }
        }
    }

    #[test]
    fn test_log_file_location() {
        assert_eq!(
            log_file_from_lookup(|_| None),
            PathBuf::from("stablecoin_monitor.log")
        );
        assert_eq!(
            log_file_from_lookup(|_| Some("  ".to_string())),
            PathBuf::from("stablecoin_monitor.log")
        );
        assert_eq!(
            log_file_from_lookup(|key| (key == "LOG_FILE").then(|| "/var/log/peg.log".to_string())),
            PathBuf::from("/var/log/peg.log")
        );
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let config = config_from(&[("EMAIL_PASSWORD", "hunter2")]).unwrap();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
