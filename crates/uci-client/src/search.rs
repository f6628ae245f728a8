//! A running search: streamed progress, a single best move, and the
//! `stop`/`ponderhit` controls.
//!
//! Starting a search moves the session's inbound queue into a pump task. The
//! pump forwards every `info` line in arrival order and keeps reading until the
//! engine's `bestmove`, even when nobody is listening any more, so no search
//! output is left behind for the next command. When the search ends the pump
//! closes the info stream, returns the session to `Idle`, and only then
//! resolves the best move.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot, watch, OwnedMutexGuard};
use tracing::debug;

use crate::channel::{CommandWriter, InboundQueue, Reply};
use crate::command::Command;
use crate::error::UciError;
use crate::info::SearchInfo;
use crate::response::{BestMove, Response};
use crate::session::SessionState;

#[derive(Debug, Default)]
struct SearchFlags {
    pondering: AtomicBool,
    stop_requested: AtomicBool,
    finished: AtomicBool,
}

/// Cloneable handle for steering a search from anywhere.
pub struct SearchControl<W> {
    writer: CommandWriter<W>,
    flags: Arc<SearchFlags>,
}

impl<W> Clone for SearchControl<W> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
            flags: Arc::clone(&self.flags),
        }
    }
}

impl<W> SearchControl<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Whether `bestmove` (or a channel failure) has ended the search.
    pub fn is_finished(&self) -> bool {
        self.flags.finished.load(Ordering::Acquire)
    }

    /// Ask the engine to stop. The engine may still send `info` lines before
    /// its `bestmove`; they are delivered as usual. Only the first call writes
    /// anything; later calls and calls after the search ended are no-ops.
    pub async fn stop(&self) -> Result<(), UciError> {
        if self.is_finished() {
            debug!("Search already finished, not sending stop");
            return Ok(());
        }
        if self.flags.stop_requested.swap(true, Ordering::AcqRel) {
            debug!("Stop already requested");
            return Ok(());
        }
        self.flags.pondering.store(false, Ordering::Release);
        self.writer.send(&Command::Stop).await
    }

    /// Tell the engine the expected move was played. Only valid once, on a
    /// ponder search that is still running and has not been stopped.
    pub async fn ponder_hit(&self) -> Result<(), UciError> {
        if self.is_finished() {
            return Err(UciError::violation("ponderhit", "search has finished"));
        }
        if self.flags.stop_requested.load(Ordering::Acquire) {
            return Err(UciError::violation("ponderhit", "search is stopping"));
        }
        if !self.flags.pondering.swap(false, Ordering::AcqRel) {
            return Err(UciError::violation("ponderhit", "search is not pondering"));
        }
        self.writer.send(&Command::PonderHit).await
    }
}

/// Progress reports of one search, in the order the engine sent them. Ends
/// when the search does.
#[derive(Debug)]
pub struct InfoStream {
    rx: mpsc::UnboundedReceiver<SearchInfo>,
}

impl InfoStream {
    pub async fn next_info(&mut self) -> Option<SearchInfo> {
        self.rx.recv().await
    }
}

impl Stream for InfoStream {
    type Item = SearchInfo;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SearchInfo>> {
        self.rx.poll_recv(cx)
    }
}

/// The search's terminal result. Dropping it does not affect the search.
#[derive(Debug)]
pub struct PendingBestMove {
    rx: oneshot::Receiver<Result<BestMove, UciError>>,
}

impl Future for PendingBestMove {
    type Output = Result<BestMove, UciError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                // The pump never drops its sender unresolved unless the runtime is shutting down
                Err(UciError::SearchFailure {
                    infos_delivered: 0,
                    cause: Box::new(UciError::end_of_stream("bestmove")),
                })
            })
        })
    }
}

/// A search started with [`Session::go`](crate::Session::go).
pub struct Search<W> {
    control: SearchControl<W>,
    infos: InfoStream,
    best_move: PendingBestMove,
}

impl<W> Search<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn start(
        inbound: OwnedMutexGuard<InboundQueue>,
        writer: CommandWriter<W>,
        state: Arc<watch::Sender<SessionState>>,
        ponder: bool,
    ) -> Self {
        let (info_tx, info_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let flags = Arc::new(SearchFlags {
            pondering: AtomicBool::new(ponder),
            ..Default::default()
        });

        tokio::spawn(pump(inbound, info_tx, result_tx, state, Arc::clone(&flags)));

        Self {
            control: SearchControl { writer, flags },
            infos: InfoStream { rx: info_rx },
            best_move: PendingBestMove { rx: result_rx },
        }
    }

    pub fn control(&self) -> SearchControl<W> {
        self.control.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.control.is_finished()
    }

    /// Next progress report, or `None` once the search has ended.
    pub async fn next_info(&mut self) -> Option<SearchInfo> {
        self.infos.next_info().await
    }

    pub async fn stop(&self) -> Result<(), UciError> {
        self.control.stop().await
    }

    pub async fn ponder_hit(&self) -> Result<(), UciError> {
        self.control.ponder_hit().await
    }

    /// Wait for the result, discarding any progress not yet consumed.
    pub async fn best_move(self) -> Result<BestMove, UciError> {
        self.best_move.await
    }

    /// Drain the remaining progress reports, then wait for the result.
    pub async fn finish(mut self) -> (Vec<SearchInfo>, Result<BestMove, UciError>) {
        let mut infos = Vec::new();
        while let Some(info) = self.infos.next_info().await {
            infos.push(info);
        }
        (infos, self.best_move.await)
    }

    /// Split into independently owned pieces.
    pub fn into_parts(self) -> (SearchControl<W>, InfoStream, PendingBestMove) {
        (self.control, self.infos, self.best_move)
    }
}

async fn pump(
    mut inbound: OwnedMutexGuard<InboundQueue>,
    infos: mpsc::UnboundedSender<SearchInfo>,
    result: oneshot::Sender<Result<BestMove, UciError>>,
    state: Arc<watch::Sender<SessionState>>,
    flags: Arc<SearchFlags>,
) {
    let mut delivered = 0usize;
    let outcome = loop {
        match inbound.next("bestmove").await {
            Ok(Response::Info(info)) => {
                delivered += 1;
                // Keep draining even if the consumer went away
                let _ = infos.send(info);
            }
            Ok(Response::BestMove(best)) => break Ok(best),
            // Late answers to waits abandoned before the search started
            Ok(Response::UciOk) => {
                inbound.settle(Reply::UciOk);
            }
            Ok(Response::ReadyOk) => {
                inbound.settle(Reply::ReadyOk);
            }
            Ok(other) => debug!(?other, "Ignoring line during search"),
            Err(UciError::MalformedOption(reason)) => {
                debug!(%reason, "Ignoring option line during search")
            }
            Err(cause) => {
                break Err(UciError::SearchFailure {
                    infos_delivered: delivered,
                    cause: Box::new(cause),
                })
            }
        }
    };

    // Info is never valid after bestmove, so close it before the result resolves
    drop(infos);
    flags.finished.store(true, Ordering::Release);
    drop(inbound);
    state.send_replace(SessionState::Idle);

    debug!(infos = delivered, ok = outcome.is_ok(), "Search finished");
    let _ = result.send(outcome);
}
