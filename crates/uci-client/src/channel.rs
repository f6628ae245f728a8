//! Line channel plumbing: the single reader task and the shared command writer

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::UciError;
use crate::response::Response;

/// What the reader task forwards for each line it reads.
#[derive(Debug)]
enum Inbound {
    Response(Response),
    MalformedOption(UciError),
    ReadFailed(std::io::Error),
}

/// Replies that answer exactly one earlier command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    UciOk,
    ReadyOk,
}

/// Receiving end of the reader task. Only one consumer holds it at a time.
///
/// Also counts the `uciok`/`readyok` replies still owed for commands already
/// written, so a reply meant for an abandoned wait is not taken as the answer
/// to a newer one.
#[derive(Debug)]
pub(crate) struct InboundQueue {
    rx: mpsc::Receiver<Inbound>,
    owed_uciok: usize,
    owed_readyok: usize,
}

impl InboundQueue {
    /// Spawn the reader task over `reader` and return its queue.
    pub(crate) fn spawn<R>(reader: R, capacity: usize) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(read_lines(reader, tx));
        Self {
            rx,
            owed_uciok: 0,
            owed_readyok: 0,
        }
    }

    fn owed(&mut self, reply: Reply) -> &mut usize {
        match reply {
            Reply::UciOk => &mut self.owed_uciok,
            Reply::ReadyOk => &mut self.owed_readyok,
        }
    }

    /// Record that a command answered by `reply` was written.
    pub(crate) fn owe(&mut self, reply: Reply) {
        *self.owed(reply) += 1;
    }

    /// Account for a received `reply`. Returns `false` when it still belongs
    /// to an earlier command whose caller stopped waiting.
    pub(crate) fn settle(&mut self, reply: Reply) -> bool {
        let owed = self.owed(reply);
        *owed = owed.saturating_sub(1);
        *owed == 0
    }

    /// Next classified line.
    ///
    /// A malformed option comes back as `MalformedOption` and the queue stays
    /// usable. Closure or a read error come back as `UnexpectedEndOfStream`.
    pub(crate) async fn next(&mut self, awaiting: &'static str) -> Result<Response, UciError> {
        match self.rx.recv().await {
            Some(Inbound::Response(response)) => Ok(response),
            Some(Inbound::MalformedOption(e)) => Err(e),
            Some(Inbound::ReadFailed(source)) => Err(UciError::UnexpectedEndOfStream {
                awaiting,
                source: Some(source),
            }),
            None => Err(UciError::end_of_stream(awaiting)),
        }
    }
}

async fn read_lines<R>(mut reader: R, tx: mpsc::Sender<Inbound>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let inbound = match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("Engine output closed");
                return;
            }
            Ok(_) => {
                // Vendor banners are not always UTF-8
                let line = String::from_utf8_lossy(&buf);
                let trimmed = line.trim();
                debug!(line = trimmed, "engine >");
                match Response::parse(trimmed) {
                    Ok(response) => Inbound::Response(response),
                    Err(e) => Inbound::MalformedOption(e),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read from engine");
                let _ = tx.send(Inbound::ReadFailed(e)).await;
                return;
            }
        };
        if tx.send(inbound).await.is_err() {
            // Session and every search are gone
            return;
        }
    }
}

/// Write side of the channel, shared by the session and its searches.
pub(crate) struct CommandWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for CommandWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W> CommandWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write one command line and flush.
    pub(crate) async fn send(&self, command: &Command) -> Result<(), UciError> {
        let line = command.to_string();
        if line.contains(['\n', '\r']) {
            return Err(UciError::violation(
                command.name(),
                "arguments must not contain line breaks",
            ));
        }

        debug!(cmd = %line, "engine <");
        let mut writer = self.inner.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}
