//! Protocol session: the handshake and the command state machine

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::channel::{CommandWriter, InboundQueue, Reply};
use crate::command::{Command, Position, Registration, SearchRequest};
use crate::error::UciError;
use crate::option::EngineOption;
use crate::response::{EngineIdentity, Response};
use crate::search::Search;

/// Where the session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `uci` not sent yet, or the last handshake failed.
    Fresh,
    /// `uci` sent, waiting for `uciok`.
    HandshakePending,
    Idle,
    /// `go` sent, waiting for `bestmove`.
    BusySearching,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Fresh => "fresh",
            SessionState::HandshakePending => "awaiting uciok",
            SessionState::Idle => "idle",
            SessionState::BusySearching => "searching",
        })
    }
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Lines the reader task may buffer before it stops reading.
    pub inbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 256,
        }
    }
}

/// Client side of one engine connection.
///
/// Must be created inside a tokio runtime: construction spawns the task that
/// owns the read side for the lifetime of the session.
pub struct Session<W> {
    writer: CommandWriter<W>,
    inbound: Arc<Mutex<InboundQueue>>,
    state: Arc<watch::Sender<SessionState>>,
    identity: EngineIdentity,
    options: Vec<EngineOption>,
}

impl<W> Session<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new<R>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self::with_config(reader, writer, SessionConfig::default())
    }

    pub fn with_config<R>(reader: R, writer: W, config: SessionConfig) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (state, _) = watch::channel(SessionState::Fresh);
        Self {
            writer: CommandWriter::new(writer),
            inbound: Arc::new(Mutex::new(InboundQueue::spawn(reader, config.inbound_capacity))),
            state: Arc::new(state),
            identity: EngineIdentity::default(),
            options: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Resolves once no search is running. Useful after dropping a [`Search`]
    /// whose engine output is still being drained.
    pub async fn search_finished(&self) {
        let mut state = self.state.subscribe();
        let _ = state
            .wait_for(|s| *s != SessionState::BusySearching)
            .await;
    }

    pub fn identity(&self) -> &EngineIdentity {
        &self.identity
    }

    /// Declared options, in declaration order.
    pub fn options(&self) -> &[EngineOption] {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&EngineOption> {
        self.options.iter().find(|o| o.name == name)
    }

    fn require(&self, command: &'static str, expected: SessionState) -> Result<(), UciError> {
        let state = self.state();
        if state != expected {
            return Err(UciError::violation(command, format!("session is {state}")));
        }
        Ok(())
    }

    /// Send a command that is only legal between searches.
    async fn send_idle(&self, command: Command) -> Result<(), UciError> {
        self.require(command.name(), SessionState::Idle)?;
        self.writer.send(&command).await
    }

    /// Send `uci` and collect identity and options until `uciok`.
    ///
    /// On failure, or if the returned future is dropped before completing, the
    /// session goes back to `Fresh` and the handshake may be retried. Output
    /// left over from an earlier attempt is discarded on the retry.
    pub async fn handshake(&mut self) -> Result<(), UciError> {
        self.require("uci", SessionState::Fresh)?;
        self.identity = EngineIdentity::default();
        self.options.clear();
        self.state.send_replace(SessionState::HandshakePending);
        let mut pending = PendingHandshake {
            state: &self.state,
            completed: false,
        };

        let mut inbound = self.inbound.lock().await;
        self.writer.send(&Command::Uci).await?;
        inbound.owe(Reply::UciOk);
        read_handshake(&mut inbound, &mut self.identity, &mut self.options).await?;
        drop(inbound);

        pending.completed = true;
        self.state.send_replace(SessionState::Idle);
        info!(
            name = %self.identity.name,
            author = %self.identity.author,
            options = self.options.len(),
            "Engine handshake complete"
        );
        Ok(())
    }

    /// Send `isready` and wait for `readyok`, discarding anything else.
    pub async fn is_ready(&self) -> Result<(), UciError> {
        self.require("isready", SessionState::Idle)?;

        let mut inbound = self.inbound.lock().await;
        self.writer.send(&Command::IsReady).await?;
        inbound.owe(Reply::ReadyOk);
        loop {
            match inbound.next("readyok").await {
                Ok(Response::ReadyOk) => {
                    if inbound.settle(Reply::ReadyOk) {
                        return Ok(());
                    }
                    debug!("Discarding readyok owed to an abandoned isready")
                }
                Ok(Response::IdName(_) | Response::IdAuthor(_) | Response::Option(_)) => {
                    debug!("Ignoring identity or option line outside the handshake")
                }
                Ok(other) => debug!(?other, "Discarding line while awaiting readyok"),
                Err(UciError::MalformedOption(reason)) => {
                    debug!(%reason, "Ignoring option line outside the handshake")
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn debug(&self, on: bool) -> Result<(), UciError> {
        self.send_idle(Command::Debug(on)).await
    }

    /// Send `setoption`. An empty value sends the name alone, which is how
    /// buttons are pressed.
    pub async fn set_option(&self, name: &str, value: &str) -> Result<(), UciError> {
        self.require("setoption", SessionState::Idle)?;
        match self.option(name) {
            Some(option) if !option.accepts(value) => {
                warn!(name, value, kind = %option.kind, "Value not accepted by declared option")
            }
            Some(_) => {}
            None => warn!(name, "Engine did not declare this option"),
        }
        self.send_idle(Command::SetOption {
            name: name.to_string(),
            value: value.to_string(),
        })
        .await
    }

    pub async fn register(&self, registration: Registration) -> Result<(), UciError> {
        self.send_idle(Command::Register(registration)).await
    }

    pub async fn new_game(&self) -> Result<(), UciError> {
        self.send_idle(Command::UciNewGame).await
    }

    pub async fn position<I, M>(&self, position: Position, moves: I) -> Result<(), UciError>
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        self.send_idle(Command::Position {
            position,
            moves: moves.into_iter().map(Into::into).collect(),
        })
        .await
    }

    /// Send `go` and hand the engine's output over to a [`Search`] until
    /// `bestmove` arrives.
    pub async fn go(&mut self, request: SearchRequest) -> Result<Search<W>, UciError> {
        self.require("go", SessionState::Idle)?;

        // Taken before writing so no other reader can see this search's output
        let inbound = Arc::clone(&self.inbound).lock_owned().await;
        let ponder = request.ponder;
        self.writer.send(&Command::Go(request)).await?;
        self.state.send_replace(SessionState::BusySearching);

        Ok(Search::start(
            inbound,
            self.writer.clone(),
            Arc::clone(&self.state),
            ponder,
        ))
    }

    /// Send `quit`. Legal in any state; the session is consumed.
    pub async fn quit(self) -> Result<(), UciError> {
        self.writer.send(&Command::Quit).await
    }
}

/// Returns the session to `Fresh` unless the handshake completed.
struct PendingHandshake<'a> {
    state: &'a watch::Sender<SessionState>,
    completed: bool,
}

impl Drop for PendingHandshake<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.state.send_replace(SessionState::Fresh);
        }
    }
}

/// Read one reply to `uci`. A malformed option fails the handshake, but only
/// after the rest of the reply has been consumed up to its `uciok`.
async fn read_handshake(
    inbound: &mut InboundQueue,
    identity: &mut EngineIdentity,
    options: &mut Vec<EngineOption>,
) -> Result<(), UciError> {
    let mut name_seen = false;
    let mut author_seen = false;
    let mut malformed = None;

    loop {
        match inbound.next("uciok").await {
            Ok(Response::IdName(name)) if !name_seen => {
                identity.name = name;
                name_seen = true;
            }
            Ok(Response::IdAuthor(author)) if !author_seen => {
                identity.author = author;
                author_seen = true;
            }
            Ok(Response::IdName(_) | Response::IdAuthor(_)) => {
                debug!("Ignoring repeated id line")
            }
            Ok(Response::Option(option)) => {
                match options.iter_mut().find(|o| o.name == option.name) {
                    Some(existing) => *existing = option,
                    None => options.push(option),
                }
            }
            Ok(Response::UciOk) => {
                if !inbound.settle(Reply::UciOk) {
                    debug!("Discarding reply to an abandoned handshake");
                    *identity = EngineIdentity::default();
                    options.clear();
                    name_seen = false;
                    author_seen = false;
                    malformed = None;
                    continue;
                }
                return match malformed {
                    Some(e) => Err(e),
                    None => Ok(()),
                };
            }
            Ok(other) => debug!(?other, "Ignoring line during handshake"),
            Err(e @ UciError::MalformedOption(_)) => {
                warn!(error = %e, "Malformed option, skipping to uciok");
                malformed.get_or_insert(e);
            }
            Err(e) => return Err(malformed.unwrap_or(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::OptionKind;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
    use tokio::time::timeout;

    const HANDSHAKE: &[u8] = b"Fishy 1.0 by nobody\n\
        id name Fishy 1.0\n\
        id author Nobody\n\
        option name Hash type spin default 16 min 1 max 1024\n\
        option name Ponder type check default false\n\
        option name Hash type spin default 32 min 1 max 2048\n\
        uciok\n";

    fn session(input: &'static [u8]) -> Session<tokio::io::Sink> {
        Session::new(BufReader::new(input), tokio::io::sink())
    }

    /// A session whose engine output is written by the test as it goes. The
    /// returned command pipe must stay alive for writes to succeed.
    fn live_session() -> (Session<DuplexStream>, DuplexStream, DuplexStream) {
        let (client_out, commands) = tokio::io::duplex(4096);
        let (engine_out, client_in) = tokio::io::duplex(4096);
        (
            Session::new(BufReader::new(client_in), client_out),
            engine_out,
            commands,
        )
    }

    #[tokio::test]
    async fn test_handshake_collects_identity_and_options() {
        let mut session = session(HANDSHAKE);
        assert_eq!(session.state(), SessionState::Fresh);
        session.handshake().await.unwrap();

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.identity().name, "Fishy 1.0");
        assert_eq!(session.identity().author, "Nobody");

        // Redeclared Hash replaces the first one in place
        let names: Vec<&str> = session.options().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Hash", "Ponder"]);
        let hash = session.option("Hash").unwrap();
        assert_eq!(hash.default, "32");
        assert_eq!(hash.max, Some(2048));
        assert_eq!(session.option("Ponder").unwrap().kind, OptionKind::Check);
    }

    #[tokio::test]
    async fn test_handshake_twice_is_violation() {
        let mut session = session(HANDSHAKE);
        session.handshake().await.unwrap();
        assert!(matches!(
            session.handshake().await,
            Err(UciError::ProtocolViolation { command: "uci", .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_option_aborts_handshake() {
        let mut session = session(b"id name X\noption name Hash type spin min lots\nuciok\n");
        assert!(matches!(
            session.handshake().await,
            Err(UciError::MalformedOption(_))
        ));
        assert_eq!(session.state(), SessionState::Fresh);
    }

    #[tokio::test]
    async fn test_retry_after_malformed_option_reads_new_reply() {
        let (mut session, mut engine, _commands) = live_session();
        engine
            .write_all(
                b"option name Bad type spin default 1 min x max 2\n\
                  option name Hash type spin default 16 min 1 max 1024\n\
                  uciok\n",
            )
            .await
            .unwrap();
        assert!(matches!(
            session.handshake().await,
            Err(UciError::MalformedOption(_))
        ));
        assert_eq!(session.state(), SessionState::Fresh);

        engine
            .write_all(b"id name Real\noption name Threads type spin default 1 min 1 max 8\nuciok\n")
            .await
            .unwrap();
        session.handshake().await.unwrap();
        assert_eq!(session.identity().name, "Real");
        let names: Vec<&str> = session.options().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Threads"]);
    }

    #[tokio::test]
    async fn test_cancelled_handshake_can_be_retried() {
        let (mut session, mut engine, _commands) = live_session();
        assert!(timeout(Duration::from_millis(50), session.handshake())
            .await
            .is_err());
        assert_eq!(session.state(), SessionState::Fresh);

        // The engine answers the abandoned `uci` late, then the retry
        engine
            .write_all(b"id name First\nuciok\nid name Second\nuciok\n")
            .await
            .unwrap();
        session.handshake().await.unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.identity().name, "Second");
    }

    #[tokio::test]
    async fn test_cancelled_is_ready_reply_is_not_reused() {
        let (mut session, mut engine, _commands) = live_session();
        engine.write_all(b"uciok\n").await.unwrap();
        session.handshake().await.unwrap();

        assert!(timeout(Duration::from_millis(50), session.is_ready())
            .await
            .is_err());
        engine.write_all(b"readyok\n").await.unwrap();

        let mut ready = Box::pin(session.is_ready());
        assert!(
            timeout(Duration::from_millis(50), &mut ready).await.is_err(),
            "the late readyok answered the new isready"
        );
        engine.write_all(b"readyok\n").await.unwrap();
        ready.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_tolerates_invalid_utf8() {
        let mut session = session(b"id name Fish\nid author J\xf6rg\nuciok\n");
        session.handshake().await.unwrap();
        assert_eq!(session.identity().name, "Fish");
        assert_eq!(session.identity().author, "J\u{FFFD}rg");
    }

    #[tokio::test]
    async fn test_idle_commands_rejected_before_handshake() {
        let session = session(b"");
        assert!(matches!(
            session.set_option("Hash", "64").await,
            Err(UciError::ProtocolViolation { command: "setoption", .. })
        ));
        assert!(matches!(
            session.is_ready().await,
            Err(UciError::ProtocolViolation { command: "isready", .. })
        ));
        assert!(matches!(
            session.position(Position::StartPos, Vec::<String>::new()).await,
            Err(UciError::ProtocolViolation { command: "position", .. })
        ));
    }

    #[tokio::test]
    async fn test_is_ready_discards_other_lines() {
        let mut session = session(b"uciok\ninfo string loading\nid name Late\nreadyok\n");
        session.handshake().await.unwrap();
        session.is_ready().await.unwrap();
        assert_eq!(session.identity().name, "");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_is_ready_end_of_stream() {
        let mut session = session(b"uciok\ninfo string bye\n");
        session.handshake().await.unwrap();
        assert!(matches!(
            session.is_ready().await,
            Err(UciError::UnexpectedEndOfStream { awaiting: "readyok", .. })
        ));
    }

    #[tokio::test]
    async fn test_commands_written_in_order() {
        let (client, mut engine) = tokio::io::duplex(1024);
        let mut session = Session::new(BufReader::new(&b"uciok\n"[..]), client);
        session.handshake().await.unwrap();
        session.debug(false).await.unwrap();
        session.new_game().await.unwrap();
        session.set_option("Clear Hash", "").await.unwrap();
        session.register(Registration::Later).await.unwrap();
        session.position(Position::StartPos, ["e2e4"]).await.unwrap();
        session.quit().await.unwrap();

        let mut written = String::new();
        engine.read_to_string(&mut written).await.unwrap();
        assert_eq!(
            written,
            "uci\ndebug off\nucinewgame\nsetoption name Clear Hash\nregister later\n\
             position startpos moves e2e4\nquit\n"
        );
    }
}
