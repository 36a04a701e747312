use std::result::Result as StdResult;
use thiserror::Error;
use reqwest;
use serde_json;
use anyhow;
use prometheus;
use std::io;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Wallet provider not ready: {0}")]
    ProviderNotReady(String),
    #[error("Wallet access rejected (code {0})")]
    AccessRejected(i64),
    #[error("Wallet is not connected")]
    NotConnected,
    #[error("Operation declined by user: {0}")]
    UserDeclined(String),
    #[error("An approval is already in progress")]
    ApprovalInProgress,
    #[error("Failed to build transaction: {0}")]
    TransactionBuild(String),
    #[error("Failed to sign transaction: {0}")]
    TransactionSign(String),
    #[error("Failed to broadcast transaction: {0}")]
    TransactionBroadcast(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Relay error: {0}")]
    RelayError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

impl Error {
    /// Failures caused by a transaction step, as opposed to readiness or input problems.
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            Error::TransactionBuild(_) | Error::TransactionSign(_) | Error::TransactionBroadcast(_)
        )
    }
}

pub type Result<T> = StdResult<T, Error>;
