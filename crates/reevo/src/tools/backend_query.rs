use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::registry::{ToolContext, ToolHandler};
use crate::backend::{BackendClient, BackendError};
use crate::errors::{AgentError, AgentResult};
use crate::models::chat::ChatMessage;
use crate::models::tool::Tool;
use crate::speech::strip_markdown;

pub const BACKEND_TOOL_NAME: &str = "query_reevo_backend";

/// Spoken instead of the backend's answer whenever the backend cannot be used
pub const FALLBACK_RESPONSE: &str = "I'm sorry, the external service is unavailable right now.";

const CHECKING_INSTRUCTIONS: &str = "Say 'Let me check that for you' - keep it very brief";

#[derive(Debug, Deserialize)]
struct BackendQueryParams {
    query: String,
    #[serde(default)]
    conversation_history: Option<Vec<ChatMessage>>,
}

/// Forwards a question to the Reevo backend and streams its answer back
#[derive(Debug, Clone)]
pub struct BackendQueryTool {
    client: BackendClient,
}

impl BackendQueryTool {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    pub fn tool() -> Tool {
        Tool::new(
            BACKEND_TOOL_NAME,
            "Query the Reevo external backend API for specialized responses. Use it ALWAYS to check \
             if there is meaningful information to be provided, like Meetings, CRM data etc. \
             Reevo is an All-IN-ONE sales platform.",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The user's query to send to the external backend"
                    },
                    "conversation_history": {
                        "type": "array",
                        "description": "Optional conversation history for context",
                        "items": {
                            "type": "object",
                            "required": ["role", "content"],
                            "properties": {
                                "role": {"type": "string", "enum": ["system", "user", "assistant"]},
                                "content": {"type": "string"}
                            }
                        }
                    }
                }
            }),
        )
    }

    /// Ask the backend `query` in the context of `history`.
    ///
    /// Text is handed to `on_chunk` as it streams in. Never fails: any problem
    /// with the backend is logged and answered with [`FALLBACK_RESPONSE`].
    pub async fn query<F>(&self, history: &[ChatMessage], query: &str, on_chunk: F) -> String
    where
        F: FnMut(&str) + Send,
    {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(query));

        info!(
            %query,
            history = history.len(),
            mode = %self.client.config().mode(),
            "querying external backend"
        );

        match self.client.chat(&messages, on_chunk).await {
            Ok(raw) => {
                let spoken = strip_markdown(&raw);
                if spoken.is_empty() {
                    warn!(raw_len = raw.len(), "backend reply had no speakable text");
                    return FALLBACK_RESPONSE.to_string();
                }
                info!(raw_len = raw.len(), spoken_len = spoken.len(), "backend reply ready for speech");
                spoken
            }
            Err(e) => {
                log_failure(&e);
                FALLBACK_RESPONSE.to_string()
            }
        }
    }
}

fn log_failure(e: &BackendError) {
    if e.is_connection_failure() {
        error!(error = %e, "external backend unreachable");
    } else {
        error!(error = %e, "external backend request failed");
    }
}

#[async_trait]
impl ToolHandler for BackendQueryTool {
    async fn call(&self, arguments: Value, ctx: &ToolContext) -> AgentResult<String> {
        let params: BackendQueryParams = serde_json::from_value(arguments)?;
        if params.query.trim().is_empty() {
            return Err(AgentError::InvalidParameters(
                "query must not be empty".to_string(),
            ));
        }

        ctx.generate_reply(CHECKING_INSTRUCTIONS);

        let history = match &params.conversation_history {
            Some(history) => history.as_slice(),
            None => &ctx.history[..],
        };
        Ok(self
            .query(history, &params.query, |text| ctx.chunk(text))
            .await)
    }
}
