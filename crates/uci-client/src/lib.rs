//! Async client for the Universal Chess Interface (UCI).
//!
//! A [`Session`] drives an engine over any line-oriented duplex channel:
//! it performs the `uci` handshake, tracks the protocol state, sends commands,
//! and runs searches whose progress streams back while the caller stays free
//! to `stop` or `ponderhit`. [`EngineProcess`] wires a session to a spawned
//! engine binary.

mod channel;
pub mod command;
pub mod error;
pub mod info;
pub mod option;
pub mod process;
pub mod response;
pub mod search;
pub mod session;
mod tokens;

pub use command::{Command, Position, Registration, SearchRequest};
pub use error::UciError;
pub use info::{Score, ScoreValue, SearchInfo};
pub use option::{EngineOption, OptionKind};
pub use process::EngineProcess;
pub use response::{BestMove, EngineIdentity, Response};
pub use search::{InfoStream, PendingBestMove, Search, SearchControl};
pub use session::{Session, SessionConfig, SessionState};
