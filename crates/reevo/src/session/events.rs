use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Things the agent asks of the surrounding voice session, or reports to it.
///
/// These are serialised one per line by the worker, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Ask the session to say something short on its own, e.g. a filler while a tool runs
    GenerateReply { instructions: String },
    ToolStarted {
        turn: u64,
        id: String,
        name: String,
    },
    ToolChunk {
        turn: u64,
        id: String,
        text: String,
    },
    ToolFinished {
        turn: u64,
        id: String,
        name: String,
        result: String,
    },
    /// Text ready for synthesis, already shaped for pronunciation
    Speak { turn: u64, text: String },
    TurnComplete { turn: u64 },
    TurnCancelled { turn: u64 },
    Error { turn: Option<u64>, message: String },
}

impl SessionEvent {
    pub fn turn(&self) -> Option<u64> {
        match self {
            SessionEvent::GenerateReply { .. } => None,
            SessionEvent::ToolStarted { turn, .. }
            | SessionEvent::ToolChunk { turn, .. }
            | SessionEvent::ToolFinished { turn, .. }
            | SessionEvent::Speak { turn, .. }
            | SessionEvent::TurnComplete { turn }
            | SessionEvent::TurnCancelled { turn } => Some(*turn),
            SessionEvent::Error { turn, .. } => *turn,
        }
    }
}

/// Sending half of the session event channel.
///
/// Emitting never fails from the caller's point of view: once the session is
/// gone there is nobody left to tell.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// A sink that drops everything
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Returns whether the event reached a live receiver
    pub fn emit(&self, event: SessionEvent) -> bool {
        match &self.tx {
            Some(tx) => match tx.send(event) {
                Ok(()) => true,
                Err(e) => {
                    debug!(event = ?e.0, "session event dropped, receiver closed");
                    false
                }
            },
            None => false,
        }
    }
}
