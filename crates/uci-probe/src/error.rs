//! Probe error types

use thiserror::Error;
use uci_client::UciError;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Uci(#[from] UciError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
