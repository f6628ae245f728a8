//! JSON-lines output on stdout

use serde::Serialize;
use uci_client::{BestMove, EngineOption, SearchInfo};

use crate::error::ProbeError;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event<'a> {
    Identity {
        name: &'a str,
        author: &'a str,
        options: &'a [EngineOption],
    },
    Info(&'a SearchInfo),
    #[serde(rename = "bestmove")]
    BestMove(&'a BestMove),
    Error {
        message: String,
    },
}

pub fn render(event: &Event<'_>) -> Result<String, ProbeError> {
    Ok(serde_json::to_string(event)?)
}

pub fn emit(event: &Event<'_>) -> Result<(), ProbeError> {
    println!("{}", render(event)?);
    Ok(())
}
