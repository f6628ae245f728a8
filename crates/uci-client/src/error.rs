//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    /// An `option` declaration that could not be parsed.
    #[error("Malformed option: {0}")]
    MalformedOption(String),

    /// A command issued in a session state that forbids it. Nothing was written.
    #[error("Protocol violation: `{command}` rejected, {reason}")]
    ProtocolViolation {
        command: &'static str,
        reason: String,
    },

    /// The engine's output closed (or failed) before the awaited token arrived.
    #[error("Engine output ended while awaiting `{awaiting}`")]
    UnexpectedEndOfStream {
        awaiting: &'static str,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The channel failed during an active search.
    #[error("Search failed after {infos_delivered} info lines: {cause}")]
    SearchFailure {
        infos_delivered: usize,
        #[source]
        cause: Box<UciError>,
    },

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UciError {
    pub(crate) fn violation(command: &'static str, reason: impl Into<String>) -> Self {
        UciError::ProtocolViolation {
            command,
            reason: reason.into(),
        }
    }

    pub(crate) fn end_of_stream(awaiting: &'static str) -> Self {
        UciError::UnexpectedEndOfStream {
            awaiting,
            source: None,
        }
    }
}
