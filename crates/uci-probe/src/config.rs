//! Probe configuration from environment variables

use std::env;

use uci_client::SessionConfig;

use crate::error::ProbeError;

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// Path to the engine binary
    pub engine_path: String,

    /// Extra command-line arguments for the engine
    pub engine_args: Vec<String>,

    /// Options applied after the handshake, in order
    pub engine_options: Vec<(String, String)>,

    /// Send `debug on` after the handshake
    pub engine_debug: bool,

    /// Engine output lines buffered ahead of the session
    pub inbound_capacity: usize,
}

impl ProbeConfig {
    /// Load configuration from environment variables (and `.env`, if the
    /// caller loaded it first).
    pub fn load() -> Result<Self, ProbeError> {
        let engine_path = env::var("ENGINE_PATH").unwrap_or_else(|_| "stockfish".to_string());

        let engine_args = env::var("ENGINE_ARGS")
            .map(|v| v.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        let engine_options = match env::var("ENGINE_OPTIONS") {
            Ok(raw) => parse_engine_options(&raw)?,
            Err(_) => Vec::new(),
        };

        let engine_debug = env::var("ENGINE_DEBUG")
            .map(|v| matches!(v.trim(), "1" | "true" | "on"))
            .unwrap_or(false);

        let inbound_capacity = env::var("INBOUND_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SessionConfig::default().inbound_capacity);

        Ok(Self {
            engine_path,
            engine_args,
            engine_options,
            engine_debug,
            inbound_capacity,
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            inbound_capacity: self.inbound_capacity,
        }
    }
}

/// Parse `Name=Value;Other Name=Value`. A bare name presses a button option.
fn parse_engine_options(raw: &str) -> Result<Vec<(String, String)>, ProbeError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, value) = entry.split_once('=').unwrap_or((entry, ""));
            let name = name.trim();
            if name.is_empty() {
                return Err(ProbeError::Config(format!(
                    "ENGINE_OPTIONS entry {entry:?} has no option name"
                )));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
