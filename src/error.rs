use thiserror::Error;

#[derive(Error, Debug)]
pub enum PegWatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Failure to obtain a price for the current cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Price not found: {0}")]
    NotFound(String),
}

/// Failure to deliver an alert. Never fatal to the monitor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("notifier configuration incomplete, missing {}", missing.join(", "))]
    ConfigIncomplete { missing: Vec<&'static str> },

    #[error("Invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Message(String),

    /// Permanent SMTP rejection, e.g. bad credentials or refused recipient.
    #[error("Rejected by mail server: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
