//! Commands sent to the engine, rendered as exact protocol lines.

use std::fmt;
use std::time::Duration;

/// Position to set up before a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    StartPos,
    Fen(String),
}

/// Arguments of the `register` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Later,
    Credentials { name: String, code: String },
}

/// Parameters for the `go` command.
///
/// Absent and zero-valued fields are left out of the command. Durations are
/// truncated to whole milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    /// Restrict the search to these moves, if any.
    pub search_moves: Vec<String>,
    pub ponder: bool,
    pub infinite: bool,
    /// Search for a mate in this many moves.
    pub mate: Option<u32>,
    pub move_time: Option<Duration>,
    pub white_time: Option<Duration>,
    pub black_time: Option<Duration>,
    pub white_increment: Option<Duration>,
    pub black_increment: Option<Duration>,
    /// Moves remaining until the next time control.
    pub moves_to_go: Option<u32>,
    /// Number of plies to search.
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
}

impl SearchRequest {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn nodes(nodes: u64) -> Self {
        Self {
            nodes: Some(nodes),
            ..Default::default()
        }
    }

    pub fn move_time(move_time: Duration) -> Self {
        Self {
            move_time: Some(move_time),
            ..Default::default()
        }
    }

    pub fn mate(moves: u32) -> Self {
        Self {
            mate: Some(moves),
            ..Default::default()
        }
    }

    pub fn infinite() -> Self {
        Self {
            infinite: true,
            ..Default::default()
        }
    }
}

/// A single client-to-engine command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Uci,
    Debug(bool),
    IsReady,
    /// An empty value sends the option name alone (for buttons).
    SetOption { name: String, value: String },
    Register(Registration),
    UciNewGame,
    Position { position: Position, moves: Vec<String> },
    Go(SearchRequest),
    Stop,
    PonderHit,
    Quit,
}

impl Command {
    /// The command keyword, for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Uci => "uci",
            Command::Debug(_) => "debug",
            Command::IsReady => "isready",
            Command::SetOption { .. } => "setoption",
            Command::Register(_) => "register",
            Command::UciNewGame => "ucinewgame",
            Command::Position { .. } => "position",
            Command::Go(_) => "go",
            Command::Stop => "stop",
            Command::PonderHit => "ponderhit",
            Command::Quit => "quit",
        }
    }
}

fn write_moves(f: &mut fmt::Formatter<'_>, keyword: &str, moves: &[String]) -> fmt::Result {
    if !moves.is_empty() {
        write!(f, " {keyword} {}", moves.join(" "))?;
    }
    Ok(())
}

fn write_number(f: &mut fmt::Formatter<'_>, keyword: &str, value: Option<u64>) -> fmt::Result {
    match value {
        Some(n) if n > 0 => write!(f, " {keyword} {n}"),
        _ => Ok(()),
    }
}

fn millis(duration: Option<Duration>) -> Option<u64> {
    duration.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("go")?;
        if self.ponder {
            f.write_str(" ponder")?;
        }
        if self.infinite {
            f.write_str(" infinite")?;
        }
        write_number(f, "mate", self.mate.map(u64::from))?;
        write_number(f, "movetime", millis(self.move_time))?;
        write_number(f, "wtime", millis(self.white_time))?;
        write_number(f, "btime", millis(self.black_time))?;
        write_number(f, "winc", millis(self.white_increment))?;
        write_number(f, "binc", millis(self.black_increment))?;
        write_number(f, "movestogo", self.moves_to_go.map(u64::from))?;
        write_number(f, "depth", self.depth.map(u64::from))?;
        write_number(f, "nodes", self.nodes)?;
        // For best compatibility, searchmoves goes last
        write_moves(f, "searchmoves", &self.search_moves)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Uci => f.write_str("uci"),
            Command::Debug(true) => f.write_str("debug on"),
            Command::Debug(false) => f.write_str("debug off"),
            Command::IsReady => f.write_str("isready"),
            Command::SetOption { name, value } if value.is_empty() => {
                write!(f, "setoption name {name}")
            }
            Command::SetOption { name, value } => write!(f, "setoption name {name} value {value}"),
            Command::Register(Registration::Later) => f.write_str("register later"),
            Command::Register(Registration::Credentials { name, code }) => {
                write!(f, "register name {name} code {code}")
            }
            Command::UciNewGame => f.write_str("ucinewgame"),
            Command::Position { position, moves } => {
                match position {
                    Position::StartPos => f.write_str("position startpos")?,
                    Position::Fen(fen) => write!(f, "position fen {fen}")?,
                }
                write_moves(f, "moves", moves)
            }
            Command::Go(request) => request.fmt(f),
            Command::Stop => f.write_str("stop"),
            Command::PonderHit => f.write_str("ponderhit"),
            Command::Quit => f.write_str("quit"),
        }
    }
}
