use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, Usage};

/// Plays back a fixed script of assistant replies, one per `complete` call.
///
/// Once the script runs out every further call answers with an empty
/// assistant message, which ends the agent's turn.
pub struct MockProvider {
    script: Mutex<VecDeque<Message>>,
    usage: Usage,
}

impl MockProvider {
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            usage: Usage::default(),
        }
    }

    /// Report these token counts with every reply
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let next = self
            .script
            .lock()
            .map_err(|_| anyhow!("mock script lock poisoned"))?
            .pop_front();
        Ok((next.unwrap_or_else(Message::assistant), self.usage.clone()))
    }
}
