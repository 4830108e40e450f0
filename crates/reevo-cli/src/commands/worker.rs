//! Agent worker hosted by the external session framework.
//!
//! The framework owns audio (speech recognition, synthesis, voice activity and
//! turn detection). It hands the worker final transcripts over stdin and reads
//! back what the agent wants said over stdout, see [`crate::protocol`].
use anyhow::{Context, Result};
use reevo::agent::Agent;
use reevo::config::AgentConfig;
use reevo::pipeline::{AgentDefinition, PipelineSpec};
use reevo::session::events::{EventSink, SessionEvent};
use reevo::session::{Interrupter, VoiceSession};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::build_agent;
use crate::protocol::{self, WorkerCommand};

pub async fn run(config: &AgentConfig) -> Result<()> {
    config.require_worker()?;
    let agent = build_agent(config)?;
    let definition = AgentDefinition::for_agent(PipelineSpec::from_config(config), &agent);
    info!(
        tools = definition.tools.len(),
        backend_mode = %config.backend.mode(),
        "worker starting"
    );
    serve(
        agent,
        definition,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Run one conversation until `shutdown` or the end of input.
///
/// Turns run one after another. A new `user_turn` interrupts the turn in
/// flight, the same as an explicit `interrupt`.
pub async fn serve<R, W>(
    agent: Arc<Agent>,
    definition: AgentDefinition,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    write_line(&mut output, &protocol::session_config_line(&definition)?).await?;

    let (events, rx) = EventSink::channel();
    let mut session = VoiceSession::new(agent.clone(), events.clone());
    let writer = tokio::spawn(forward_events(rx, output));

    let (turns_tx, mut turns) = mpsc::unbounded_channel();
    let (shutdown_tx, mut shutdown) = watch::channel(());
    let reader = tokio::spawn(read_commands(
        input,
        session.interrupter(),
        events,
        turns_tx,
        shutdown_tx,
    ));

    session.greet(definition.greeting);
    loop {
        let text = tokio::select! {
            biased;
            Ok(()) = shutdown.changed() => break,
            next = turns.recv() => match next {
                Some(text) => text,
                None => break,
            },
        };
        let outcome = session.run_turn(&text).await;
        debug!(?outcome, "turn finished");
    }

    drop(session);
    reader.await??;
    writer.await??;
    let usage = agent.usage();
    info!(
        input_tokens = ?usage.input_tokens,
        output_tokens = ?usage.output_tokens,
        total_tokens = ?usage.total_tokens,
        "worker stopped"
    );
    Ok(())
}

async fn read_commands<R>(
    input: R,
    interrupter: Interrupter,
    events: EventSink,
    turns: mpsc::UnboundedSender<String>,
    shutdown: watch::Sender<()>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read command")? {
        match protocol::parse_command(&line) {
            Ok(Some(WorkerCommand::UserTurn { text })) => {
                interrupter.interrupt();
                if turns.send(text).is_err() {
                    break;
                }
            }
            Ok(Some(WorkerCommand::Interrupt)) => {
                debug!("interrupt");
                interrupter.interrupt();
            }
            Ok(Some(WorkerCommand::Shutdown)) => {
                info!("shutdown requested");
                interrupter.interrupt();
                let _ = shutdown.send(());
                break;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "ignoring malformed command");
                events.emit(SessionEvent::Error {
                    turn: None,
                    message: format!("malformed command: {}", e),
                });
            }
        }
    }
    Ok(())
}

async fn forward_events<W>(
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    mut output: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        debug!(turn = ?event.turn(), "forwarding event");
        write_line(&mut output, &protocol::event_line(&event)?).await?;
    }
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
