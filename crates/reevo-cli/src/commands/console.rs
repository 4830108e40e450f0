//! Text in, text out: the agent in a terminal, no audio involved.
use anyhow::{anyhow, Result};
use bat::WrappingMode;
use cliclack::{input, intro, outro};
use console::style;
use reevo::config::AgentConfig;
use reevo::session::events::{EventSink, SessionEvent};
use reevo::session::{TurnOutcome, VoiceSession};
use std::io::{self, Write};
use tokio::sync::mpsc::UnboundedReceiver;

use super::build_agent;

pub async fn run(config: &AgentConfig) -> Result<()> {
    config.require_console()?;
    let agent = build_agent(config)?;
    let (events, rx) = EventSink::channel();
    let mut session = VoiceSession::new(agent, events);
    let printer = tokio::spawn(print_events(rx));

    intro(style(" reevo ").on_cyan().black())?;
    println!(
        "{}",
        style(format!("backend: {}", config.backend.mode())).dim()
    );

    loop {
        let message = match input("Message:").placeholder("").multiline().interact::<String>() {
            Ok(message) => message,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => break,
            Err(e) => return Err(e.into()),
        };
        let message = message.trim();
        if message.eq_ignore_ascii_case("exit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        match session.run_turn(message).await {
            TurnOutcome::Completed { reply, .. } => render(&reply)?,
            TurnOutcome::Cancelled { turn } => {
                println!("{}", style(format!("turn {} cancelled", turn)).dim())
            }
            TurnOutcome::Failed { error, .. } => cliclack::log::error(error)?,
        }
    }

    drop(session);
    printer.await?;
    outro("Goodbye")?;
    Ok(())
}

/// Show tool activity as it happens, the reply itself is rendered once the turn is done
async fn print_events(mut rx: UnboundedReceiver<SessionEvent>) {
    let mut stdout = io::stdout();
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::GenerateReply { instructions } => {
                println!("{}", style(format!("({})", instructions)).dim().italic())
            }
            SessionEvent::ToolStarted { name, .. } => {
                println!("{} {}", style("tool").cyan(), style(name).bold())
            }
            SessionEvent::ToolChunk { text, .. } => {
                print!("{}", style(text).dim());
                let _ = stdout.flush();
            }
            SessionEvent::ToolFinished { .. } => println!(),
            SessionEvent::Error { message, .. } => {
                eprintln!("{}", style(message).red())
            }
            SessionEvent::Speak { .. }
            | SessionEvent::TurnComplete { .. }
            | SessionEvent::TurnCancelled { .. } => {}
        }
    }
}

fn render(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .theme("zenburn")
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render reply: {}", e))?;
    println!();
    io::stdout().flush()?;
    Ok(())
}
