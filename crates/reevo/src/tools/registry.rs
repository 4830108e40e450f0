use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::{AgentError, AgentResult};
use crate::models::chat::ChatMessage;
use crate::models::tool::{Tool, ToolCall};
use crate::session::events::{EventSink, SessionEvent};

const LOGGED_RESULT_CHARS: usize = 200;

/// What a tool sees of the session that called it
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub turn: u64,
    pub call_id: String,
    /// Read-only copy of the committed conversation, text turns only
    pub history: Arc<[ChatMessage]>,
    pub events: EventSink,
}

impl ToolContext {
    pub fn new<S: Into<String>>(
        turn: u64,
        call_id: S,
        history: Arc<[ChatMessage]>,
        events: EventSink,
    ) -> Self {
        Self {
            turn,
            call_id: call_id.into(),
            history,
            events,
        }
    }

    /// A context with no history whose events go nowhere
    pub fn detached<S: Into<String>>(call_id: S) -> Self {
        Self::new(0, call_id, Arc::from(Vec::new()), EventSink::disconnected())
    }

    /// Ask the session to speak a short filler while the tool works
    pub fn generate_reply<S: Into<String>>(&self, instructions: S) {
        let delivered = self.events.emit(SessionEvent::GenerateReply {
            instructions: instructions.into(),
        });
        if !delivered {
            warn!(call_id = %self.call_id, "could not generate voice response, session not available");
        }
    }

    pub fn chunk(&self, text: &str) {
        self.events.emit(SessionEvent::ToolChunk {
            turn: self.turn,
            id: self.call_id.clone(),
            text: text.to_string(),
        });
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value, ctx: &ToolContext) -> AgentResult<String>;
}

struct RegisteredTool {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Explicit mapping from tool name to its schema and handler
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, tool: Tool, handler: H) -> AgentResult<()>
    where
        H: ToolHandler + 'static,
    {
        if self.get(&tool.name).is_some() {
            return Err(AgentError::DuplicateTool(tool.name));
        }
        self.entries.push(RegisteredTool {
            tool,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Schemas in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.entries.iter().map(|entry| entry.tool.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.entries.iter().find(|entry| entry.tool.name == name)
    }

    /// Run a tool call, reporting its start and finish to the session
    pub async fn dispatch(&self, call: ToolCall, ctx: &ToolContext) -> AgentResult<String> {
        let entry = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        info!(tool = %call.name, call_id = %ctx.call_id, arguments = %call.arguments, "tool call started");
        ctx.events.emit(SessionEvent::ToolStarted {
            turn: ctx.turn,
            id: ctx.call_id.clone(),
            name: call.name.clone(),
        });

        let result = entry.handler.call(call.arguments, ctx).await;

        let reported = match &result {
            Ok(text) => text.clone(),
            Err(e) => e.to_string(),
        };
        log_finished(&call.name, &reported);
        ctx.events.emit(SessionEvent::ToolFinished {
            turn: ctx.turn,
            id: ctx.call_id.clone(),
            name: call.name,
            result: reported,
        });

        result
    }
}

fn log_finished(name: &str, result: &str) {
    let length = result.chars().count();
    if length <= LOGGED_RESULT_CHARS {
        info!(tool = %name, %result, "tool call finished");
    } else {
        let truncated: String = result.chars().take(LOGGED_RESULT_CHARS).collect();
        info!(tool = %name, result = %format!("{}...", truncated), length, "tool call finished, result truncated");
    }
}
