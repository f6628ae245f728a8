//! Engine subprocess with a session over its standard streams

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{info, warn};

use crate::error::UciError;
use crate::session::{Session, SessionConfig};

/// A running engine process. The process is killed if this is dropped
/// without [`shutdown`](EngineProcess::shutdown).
pub struct EngineProcess {
    child: Child,
    session: Session<ChildStdin>,
}

impl EngineProcess {
    /// Launch the engine at `path`. Must be called inside a tokio runtime.
    pub fn spawn<I, S>(path: &str, args: I, config: SessionConfig) -> Result<Self, UciError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        info!(path, pid = ?child.id(), "Engine process started");

        Ok(Self {
            child,
            session: Session::with_config(BufReader::new(stdout), stdin, config),
        })
    }

    pub fn session(&self) -> &Session<ChildStdin> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<ChildStdin> {
        &mut self.session
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Send `quit` and wait for the process to exit. Kills it if `quit`
    /// cannot be delivered.
    pub async fn shutdown(self) -> Result<ExitStatus, UciError> {
        let Self { mut child, session } = self;
        if let Err(e) = session.quit().await {
            warn!(error = %e, "Failed to send quit, killing engine");
            child.start_kill()?;
        }
        let status = child.wait().await?;
        info!(%status, "Engine process exited");
        Ok(status)
    }
}

fn missing_pipe(which: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("engine {which} was not captured"),
    )
}
