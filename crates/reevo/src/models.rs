//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai messages/tools, sent from the agent to the LLM
//! - chat messages, sent from the tools to the Reevo backend (and accepted by the local server)
//! - tool calls, dispatched from the agent to the tool registry
//!
//! We always immediately convert those data models into the internal structs using
//! to/from helpers.
pub mod chat;
pub mod message;
pub mod role;
pub mod tool;
