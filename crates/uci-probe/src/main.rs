//! UCI probe
//!
//! Spawns an engine, runs a single search on a position and prints the
//! engine's identity, every progress report, and the best move to stdout as
//! JSON lines. Ctrl-C stops the search; the best move is still reported.

mod config;
mod error;
mod report;

use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use tokio::process::ChildStdin;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uci_client::{EngineProcess, Position, SearchRequest, Session};

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::report::Event;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Position to search, as FEN. Defaults to the start position
    #[arg(long)]
    fen: Option<String>,

    /// Moves played from the position, comma-separated
    #[arg(long, value_delimiter = ',')]
    moves: Vec<String>,

    /// Search this many plies
    #[arg(long)]
    depth: Option<u32>,

    /// Search this many nodes
    #[arg(long)]
    nodes: Option<u64>,

    /// Search for this many milliseconds
    #[arg(long)]
    movetime: Option<u64>,

    /// Search for a mate in this many moves
    #[arg(long)]
    mate: Option<u32>,

    /// Search until interrupted
    #[arg(long)]
    infinite: bool,

    /// Start in ponder mode (stop with Ctrl-C)
    #[arg(long)]
    ponder: bool,

    /// Only consider these moves, comma-separated
    #[arg(long, value_delimiter = ',')]
    searchmoves: Vec<String>,

    /// Number of principal variations to report
    #[arg(long)]
    multipv: Option<u32>,
}

impl Args {
    fn position(&self) -> Position {
        match &self.fen {
            Some(fen) => Position::Fen(fen.clone()),
            None => Position::StartPos,
        }
    }

    fn search_request(&self) -> SearchRequest {
        SearchRequest {
            search_moves: self.searchmoves.clone(),
            ponder: self.ponder,
            infinite: self.infinite,
            mate: self.mate,
            move_time: self.movetime.map(Duration::from_millis),
            depth: self.depth,
            nodes: self.nodes,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = ProbeConfig::load()?;
    info!(
        engine_path = %config.engine_path,
        options = config.engine_options.len(),
        "Probe config loaded"
    );

    let mut engine = EngineProcess::spawn(
        &config.engine_path,
        &config.engine_args,
        config.session_config(),
    )?;

    let outcome = probe(engine.session_mut(), &config, &args).await;
    if let Err(e) = &outcome {
        report::emit(&Event::Error {
            message: e.to_string(),
        })?;
    }

    engine.shutdown().await?;
    Ok(outcome?)
}

async fn probe(
    session: &mut Session<ChildStdin>,
    config: &ProbeConfig,
    args: &Args,
) -> Result<(), ProbeError> {
    session.handshake().await?;
    report::emit(&Event::Identity {
        name: &session.identity().name,
        author: &session.identity().author,
        options: session.options(),
    })?;

    if config.engine_debug {
        session.debug(true).await?;
    }
    for (name, value) in &config.engine_options {
        session.set_option(name, value).await?;
    }
    if let Some(multipv) = args.multipv {
        session.set_option("MultiPV", &multipv.to_string()).await?;
    }

    session.new_game().await?;
    session.position(args.position(), args.moves.iter().cloned()).await?;
    session.is_ready().await?;

    let request = args.search_request();
    info!(command = %request, "Starting search");
    let (control, mut infos, best_move) = session.go(request).await?.into_parts();

    // Infinite and ponder searches only end on stop
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping search");
            if let Err(e) = control.stop().await {
                warn!(error = %e, "Failed to send stop");
            }
        }
    });

    while let Some(progress) = infos.next().await {
        report::emit(&Event::Info(&progress))?;
    }
    let result = best_move.await;
    interrupt.abort();

    let best = result?;
    info!(best = %best.best, ponder = ?best.ponder, "Search finished");
    report::emit(&Event::BestMove(&best))?;
    Ok(())
}
