use anyhow::Result;
use futures::stream::BoxStream;
use std::sync::{Arc, Mutex};

use crate::errors::AgentResult;
use crate::models::chat::ChatMessage;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::Tool;
use crate::providers::base::{Provider, Usage};
use crate::session::events::EventSink;
use crate::tools::{ToolContext, ToolRegistry};

/// Per-turn information handed down to the tools
#[derive(Debug, Clone)]
pub struct ReplyContext {
    pub turn: u64,
    pub history: Arc<[ChatMessage]>,
    pub events: EventSink,
}

impl ReplyContext {
    pub fn detached() -> Self {
        Self {
            turn: 0,
            history: Arc::from(Vec::new()),
            events: EventSink::disconnected(),
        }
    }
}

/// Agent drives the language model and the tools it is allowed to call
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    instructions: String,
    usage: Mutex<Usage>,
}

impl Agent {
    pub fn new<S: Into<String>>(
        provider: Box<dyn Provider>,
        registry: ToolRegistry,
        instructions: S,
    ) -> Self {
        Self {
            provider,
            registry,
            instructions: instructions.into(),
            usage: Mutex::new(Usage::default()),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.registry.tools()
    }

    /// Token counts summed over every model reply this agent has produced
    pub fn usage(&self) -> Usage {
        self.usage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record_usage(&self, usage: &Usage) {
        self.usage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .accumulate(usage);
    }

    async fn dispatch_tool_call(
        &self,
        request: &ToolRequest,
        context: &ReplyContext,
    ) -> AgentResult<String> {
        let call = request.tool_call.clone()?;
        let ctx = ToolContext::new(
            context.turn,
            request.id.clone(),
            context.history.clone(),
            context.events.clone(),
        );
        self.registry.dispatch(call, &ctx).await
    }

    /// Create a stream that yields each message as it's generated by the agent.
    /// This includes both the assistant's responses and any tool responses.
    pub fn reply<'a>(
        &'a self,
        messages: &[Message],
        context: ReplyContext,
    ) -> BoxStream<'a, Result<Message>> {
        let mut messages = messages.to_vec();
        let tools = self.registry.tools();

        Box::pin(async_stream::try_stream! {
            loop {
                let (response, usage) = self.provider.complete(
                    &self.instructions,
                    &messages,
                    &tools,
                ).await?;
                tracing::debug!(turn = context.turn, ?usage, "model replied");
                self.record_usage(&usage);

                yield response.clone();

                // let the consumer see the reply before long running tools start
                tokio::task::yield_now().await;

                let tool_requests: Vec<&ToolRequest> = response.content
                    .iter()
                    .filter_map(|content| content.as_tool_request())
                    .collect();

                if tool_requests.is_empty() {
                    break;
                }

                let futures: Vec<_> = tool_requests
                    .iter()
                    .map(|request| self.dispatch_tool_call(request, &context))
                    .collect();

                let outputs = futures::future::join_all(futures).await;

                let mut message_tool_response = Message::user();
                for (request, output) in tool_requests.iter().zip(outputs.into_iter()) {
                    message_tool_response = message_tool_response.with_tool_response(
                        request.id.clone(),
                        output,
                    );
                }

                yield message_tool_response.clone();

                messages.push(response);
                messages.push(message_tool_response);
            }
        })
    }
}
