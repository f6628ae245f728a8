//! Classification of engine output lines

use serde::Serialize;
use tracing::debug;

use crate::error::UciError;
use crate::info::SearchInfo;
use crate::option::EngineOption;
use crate::tokens::Tokens;

/// Final result of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestMove {
    #[serde(rename = "move")]
    pub best: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ponder: Option<String>,
}

impl BestMove {
    /// Parse `bestmove <move> [ponder <move>]`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = Tokens::new(line);
        if tokens.next() != Some("bestmove") {
            return None;
        }
        let best = tokens.next()?.to_string();
        let ponder = match tokens.next() {
            Some("ponder") => tokens.next().map(str::to_string),
            _ => None,
        };
        Some(Self { best, ponder })
    }
}

/// Engine identity reported with `id name` / `id author`. Empty if never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineIdentity {
    pub name: String,
    pub author: String,
}

/// One line of engine output, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    IdName(String),
    IdAuthor(String),
    Option(EngineOption),
    UciOk,
    ReadyOk,
    Info(SearchInfo),
    BestMove(BestMove),
    /// Anything else, including vendor diagnostics and malformed info lines.
    Unrecognized(String),
}

impl Response {
    /// Classify a line. Only an unparseable `option` declaration is an error;
    /// every other line yields some `Response`.
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let line = line.trim();
        let mut tokens = Tokens::new(line);

        let response = match tokens.next() {
            Some("id") => match tokens.next() {
                Some("name") => Response::IdName(tokens.remainder().to_string()),
                Some("author") => Response::IdAuthor(tokens.remainder().to_string()),
                _ => Response::Unrecognized(line.to_string()),
            },
            Some("option") => Response::Option(EngineOption::parse(line)?),
            Some("uciok") if tokens.peek().is_none() => Response::UciOk,
            Some("readyok") if tokens.peek().is_none() => Response::ReadyOk,
            Some("info") => match SearchInfo::parse(line) {
                Some(info) => Response::Info(info),
                None => {
                    debug!(line, "Dropping malformed info line");
                    Response::Unrecognized(line.to_string())
                }
            },
            Some("bestmove") => match BestMove::parse(line) {
                Some(best) => Response::BestMove(best),
                None => {
                    debug!(line, "Dropping bestmove line without a move");
                    Response::Unrecognized(line.to_string())
                }
            },
            _ => Response::Unrecognized(line.to_string()),
        };
        Ok(response)
    }
}
