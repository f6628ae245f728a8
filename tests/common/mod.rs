#![allow(dead_code)]

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;
use uci_client::Session;

/// One step of an engine transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A command the client must send next (`> ` lines).
    Expect(String),
    /// A line the engine writes (`< ` lines).
    Say(String),
}

/// Parse a transcript. `>` lines are client commands, `<` lines are engine
/// output, `#` lines and blank lines are ignored.
pub fn transcript(text: &str) -> Vec<Step> {
    text.lines()
        .filter_map(|line| {
            if let Some(command) = line.strip_prefix('>') {
                Some(Step::Expect(command.trim().to_string()))
            } else if let Some(output) = line.strip_prefix('<') {
                Some(Step::Say(output.strip_prefix(' ').unwrap_or(output).to_string()))
            } else {
                None
            }
        })
        .collect()
}

/// What the fake engine saw after its transcript ran out.
#[derive(Debug, Default)]
pub struct Replay {
    /// Commands received after the last scripted step.
    pub trailing: Vec<String>,
}

/// Spawn a fake engine that follows the given transcripts in order and a
/// session connected to it. The engine closes its output once the script is
/// exhausted, then collects whatever the client still sends until the
/// session's writer is dropped.
///
/// The handle resolves to an error naming the first command that did not
/// match the script.
pub fn replay(parts: &[&str]) -> (Session<DuplexStream>, JoinHandle<Result<Replay, String>>) {
    let steps: Vec<Step> = parts.iter().flat_map(|part| transcript(part)).collect();

    let (client_out, engine_in) = tokio::io::duplex(64 * 1024);
    let (mut engine_out, client_in) = tokio::io::duplex(64 * 1024);

    let engine = tokio::spawn(async move {
        let mut commands = BufReader::new(engine_in).lines();
        for step in steps {
            match step {
                Step::Expect(expected) => {
                    let received = commands
                        .next_line()
                        .await
                        .map_err(|e| e.to_string())?
                        .ok_or_else(|| format!("client hung up, expected {expected:?}"))?;
                    if received != expected {
                        return Err(format!("expected {expected:?}, got {received:?}"));
                    }
                }
                Step::Say(line) => {
                    engine_out
                        .write_all(format!("{line}\n").as_bytes())
                        .await
                        .map_err(|e| e.to_string())?;
                }
            }
        }
        drop(engine_out);

        let mut replay = Replay::default();
        while let Ok(Some(line)) = commands.next_line().await {
            replay.trailing.push(line);
        }
        Ok(replay)
    });

    (Session::new(BufReader::new(client_in), client_out), engine)
}
