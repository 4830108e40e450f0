//! In-memory voice session: owns the conversation and runs one turn at a time.
//!
//! A turn's messages are kept aside while it runs and only appended to the
//! history once the turn completes. An interrupted or failed turn leaves the
//! history exactly as it was.
pub mod events;

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::agent::{Agent, ReplyContext};
use crate::models::chat::history_to_chat;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::speech::{strip_markdown, Pronunciations};
use events::{EventSink, SessionEvent};

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed { turn: u64, reply: String },
    Cancelled { turn: u64 },
    Failed { turn: u64, error: String },
}

/// Cancels whatever turn is running when [`Interrupter::interrupt`] is called.
///
/// Turns started after the interrupt are not affected.
#[derive(Debug, Clone)]
pub struct Interrupter {
    tx: Arc<watch::Sender<u64>>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }
}

pub struct VoiceSession {
    agent: Arc<Agent>,
    history: Vec<Message>,
    events: EventSink,
    pronunciations: Pronunciations,
    interrupts: Arc<watch::Sender<u64>>,
    next_turn: u64,
}

impl VoiceSession {
    pub fn new(agent: Arc<Agent>, events: EventSink) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            agent,
            history: Vec::new(),
            events,
            pronunciations: Pronunciations::default(),
            interrupts: Arc::new(tx),
            next_turn: 1,
        }
    }

    /// Committed conversation
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            tx: self.interrupts.clone(),
        }
    }

    /// Ask the session to open the conversation
    pub fn greet<S: Into<String>>(&self, instructions: S) {
        self.events.emit(SessionEvent::GenerateReply {
            instructions: instructions.into(),
        });
    }

    /// Run a full turn for what the user said
    pub async fn run_turn(&mut self, user_text: &str) -> TurnOutcome {
        let turn = self.next_turn;
        self.next_turn += 1;

        let mut cancelled = self.interrupts.subscribe();
        cancelled.borrow_and_update();

        let user = Message::user().with_text(user_text);
        let context = ReplyContext {
            turn,
            history: Arc::from(history_to_chat(&self.history)),
            events: self.events.clone(),
        };
        let mut conversation = self.history.clone();
        conversation.push(user.clone());

        info!(turn, history = self.history.len(), "turn started");
        let agent = self.agent.clone();
        let events = self.events.clone();
        let pronunciations = &self.pronunciations;
        let run = async {
            let mut pending = vec![user];
            let mut spoken = Vec::new();
            let mut stream = agent.reply(&conversation, context);
            while let Some(message) = stream.next().await {
                let message = message?;
                if message.role == Role::Assistant {
                    let text = strip_markdown(&message.text());
                    if !text.is_empty() {
                        events.emit(SessionEvent::Speak {
                            turn,
                            text: pronunciations.apply(&text),
                        });
                        spoken.push(text);
                    }
                }
                pending.push(message);
            }
            anyhow::Ok((pending, spoken.join(" ")))
        };

        let result = tokio::select! {
            result = run => Some(result),
            _ = cancelled.changed() => None,
        };

        match result {
            Some(Ok((pending, reply))) => {
                self.history.extend(pending);
                self.events.emit(SessionEvent::TurnComplete { turn });
                info!(turn, history = self.history.len(), "turn complete");
                TurnOutcome::Completed { turn, reply }
            }
            Some(Err(e)) => {
                warn!(turn, error = %e, "turn failed");
                self.events.emit(SessionEvent::Error {
                    turn: Some(turn),
                    message: e.to_string(),
                });
                TurnOutcome::Failed {
                    turn,
                    error: e.to_string(),
                }
            }
            None => {
                info!(turn, "turn interrupted, partial reply dropped");
                self.events.emit(SessionEvent::TurnCancelled { turn });
                TurnOutcome::Cancelled { turn }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::{Tool, ToolCall};
    use crate::providers::base::{Provider, Usage};
    use crate::providers::mock::MockProvider;
    use crate::tools::{ToolRegistry, WeatherTool};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn session_with(provider: Box<dyn Provider>) -> (VoiceSession, UnboundedReceiver<SessionEvent>) {
        let mut registry = ToolRegistry::new();
        registry.register(WeatherTool::tool(), WeatherTool).unwrap();
        let agent = Arc::new(Agent::new(provider, registry, "be brief"));
        let (events, rx) = EventSink::channel();
        (VoiceSession::new(agent, events), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Speaks and calls a tool, then never answers the follow-up
    struct StallingProvider;

    #[async_trait]
    impl Provider for StallingProvider {
        async fn complete(
            &self,
            _system: &str,
            messages: &[Message],
            _tools: &[Tool],
        ) -> anyhow::Result<(Message, Usage)> {
            let answered_tool = messages
                .last()
                .map(|m| m.content.iter().any(|c| c.as_tool_response().is_some()))
                .unwrap_or(false);
            if answered_tool {
                futures::future::pending::<()>().await;
            }
            Ok((
                Message::assistant()
                    .with_text("Let me check the API.")
                    .with_tool_request(
                        "1",
                        Ok(ToolCall::new("lookup_weather", json!({"location": "Austin"}))),
                    ),
                Usage::default(),
            ))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn complete(
            &self,
            _system: &str,
            _messages: &[Message],
            _tools: &[Tool],
        ) -> anyhow::Result<(Message, Usage)> {
            Err(anyhow::anyhow!("Server error: 503 Service Unavailable"))
        }
    }

    #[tokio::test]
    async fn test_completed_turn_is_committed() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new("lookup_weather", json!({"location": "Austin"}))),
            ),
            Message::assistant().with_text("It's **sunny** in Austin, says the AI."),
        ]);
        let (mut session, mut rx) = session_with(Box::new(provider));

        let outcome = session.run_turn("Weather in Austin?").await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                turn: 1,
                reply: "It's sunny in Austin, says the AI.".to_string()
            }
        );
        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[0].text(), "Weather in Austin?");

        let events = drain(&mut rx);
        assert!(events.contains(&SessionEvent::Speak {
            turn: 1,
            text: "It's sunny in Austin, says the A I.".to_string()
        }));
        assert_eq!(events.last(), Some(&SessionEvent::TurnComplete { turn: 1 }));
    }

    #[tokio::test]
    async fn test_interrupted_turn_is_dropped() {
        let (mut session, mut rx) = session_with(Box::new(StallingProvider));
        let interrupter = session.interrupter();

        let handle = tokio::spawn(async move {
            let outcome = session.run_turn("weather?").await;
            (outcome, session)
        });

        // the tool round has finished once this arrives, the model call after it stalls
        loop {
            match rx.recv().await {
                Some(SessionEvent::ToolFinished { .. }) => break,
                Some(_) => continue,
                None => panic!("session closed early"),
            }
        }
        interrupter.interrupt();

        let (outcome, session) = handle.await.unwrap();
        assert_eq!(outcome, TurnOutcome::Cancelled { turn: 1 });
        assert!(session.history().is_empty());
        assert_eq!(drain(&mut rx), vec![SessionEvent::TurnCancelled { turn: 1 }]);
    }

    #[tokio::test]
    async fn test_interrupt_between_turns_is_ignored() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_text("First."),
            Message::assistant().with_text("Second."),
        ]);
        let (mut session, _rx) = session_with(Box::new(provider));

        session.interrupter().interrupt();
        assert!(matches!(
            session.run_turn("one").await,
            TurnOutcome::Completed { turn: 1, .. }
        ));
        assert!(matches!(
            session.run_turn("two").await,
            TurnOutcome::Completed { turn: 2, .. }
        ));

        let texts: Vec<String> = session.history().iter().map(Message::text).collect();
        assert_eq!(texts, vec!["one", "First.", "two", "Second."]);
    }

    #[tokio::test]
    async fn test_failed_turn_reports_error() {
        let (mut session, mut rx) = session_with(Box::new(FailingProvider));
        let outcome = session.run_turn("hello").await;

        assert!(matches!(outcome, TurnOutcome::Failed { turn: 1, .. }));
        assert!(session.history().is_empty());
        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Error { turn: Some(1), .. })
        ));
    }

    #[test]
    fn test_greeting_is_a_generate_reply() {
        let (session, mut rx) = session_with(Box::new(MockProvider::new(vec![])));
        session.greet("Greet the user");
        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::GenerateReply {
                instructions: "Greet the user".to_string()
            }]
        );
    }
}
