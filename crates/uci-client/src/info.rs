//! Search progress reported on `info` lines

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::tokens::Tokens;

/// Evaluation of the position, from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreValue {
    /// Positive favors the side to move.
    Centipawns(i32),
    /// Moves until mate; negative when the side to move is getting mated,
    /// zero when the position is already mate.
    Mate(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub value: ScoreValue,
    pub lower_bound: bool,
    pub upper_bound: bool,
}

impl Score {
    pub fn centipawns(cp: i32) -> Self {
        Self {
            value: ScoreValue::Centipawns(cp),
            lower_bound: false,
            upper_bound: false,
        }
    }

    pub fn mate(moves: i32) -> Self {
        Self {
            value: ScoreValue::Mate(moves),
            lower_bound: false,
            upper_bound: false,
        }
    }

    /// Parse the operands of `score`. Stops at the first token that is not part
    /// of the score; the bounds flags may come before or after the value.
    fn parse(tokens: &mut Tokens<'_>) -> Option<Self> {
        let mut value = None;
        let mut lower_bound = false;
        let mut upper_bound = false;

        while let Some(key) = tokens.peek() {
            match key {
                "cp" => {
                    tokens.next();
                    value = Some(ScoreValue::Centipawns(tokens.parse_next()?));
                }
                "mate" => {
                    tokens.next();
                    value = Some(ScoreValue::Mate(tokens.parse_next()?));
                }
                "lowerbound" => {
                    tokens.next();
                    lower_bound = true;
                }
                "upperbound" => {
                    tokens.next();
                    upper_bound = true;
                }
                _ => break,
            }
        }

        Some(Self {
            value: value?,
            lower_bound,
            upper_bound,
        })
    }
}

/// One snapshot of search progress. Every field is optional: a line may update
/// any subset of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seldepth: Option<u32>,
    #[serde(
        rename = "time_ms",
        serialize_with = "serialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv: Option<Vec<String>>,
    /// 1-based line index in multi-PV mode, 0 when disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multipv: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currmove: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currmovenumber: Option<u32>,
    /// Permille.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashfull: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbhits: Option<u64>,
    /// Permille.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpuload: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refutation: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currline: Option<Vec<String>>,
}

fn serialize_millis<S: Serializer>(time: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match time {
        Some(d) => serializer.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        None => serializer.serialize_none(),
    }
}

impl SearchInfo {
    /// Parse an `info` line. Returns `None` when the line is not an `info` line
    /// or a known key carries an unusable operand.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = Tokens::new(line);
        if tokens.next() != Some("info") {
            return None;
        }

        let mut info = SearchInfo::default();
        while let Some(key) = tokens.next() {
            match key {
                "depth" => info.depth = Some(tokens.parse_next()?),
                "seldepth" => info.seldepth = Some(tokens.parse_next()?),
                "time" => info.time = Some(Duration::from_millis(tokens.parse_next()?)),
                "nodes" => info.nodes = Some(tokens.parse_next()?),
                "multipv" => info.multipv = Some(tokens.parse_next()?),
                "score" => info.score = Some(Score::parse(&mut tokens)?),
                "currmove" => info.currmove = Some(tokens.next()?.to_string()),
                "currmovenumber" => info.currmovenumber = Some(tokens.parse_next()?),
                "hashfull" => info.hashfull = Some(tokens.parse_next()?),
                "nps" => info.nps = Some(tokens.parse_next()?),
                "tbhits" => info.tbhits = Some(tokens.parse_next()?),
                "cpuload" => info.cpuload = Some(tokens.parse_next()?),
                // These take the rest of the line, whatever it contains
                "pv" => info.pv = Some(tokens.take_rest()),
                "refutation" => info.refutation = Some(tokens.take_rest()),
                "currline" => info.currline = Some(tokens.take_rest()),
                "string" => info.string = Some(tokens.remainder().to_string()),
                _ => {}
            }
        }
        Some(info)
    }
}
