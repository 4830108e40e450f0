use serde::{Deserialize, Serialize};

use super::message::Message;
use super::role::Role;

/// Role of a message on the backend chat wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        }
    }
}

/// An OpenAI style chat message, as accepted by `/chat` and `/api/v1/chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new<S: Into<String>>(role: ChatRole, content: S) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// Body of a backend chat request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Asks the legacy endpoint for a single JSON body instead of a text stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            stream: None,
        }
    }
}

/// Non-streamed reply of the legacy endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Flatten the agent history into the chat wire format.
///
/// Tool requests and tool responses are dropped, only spoken text is kept.
pub fn history_to_chat(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter_map(|message| {
            let text = message.text();
            if text.trim().is_empty() {
                None
            } else {
                Some(ChatMessage::new(message.role.into(), text))
            }
        })
        .collect()
}
