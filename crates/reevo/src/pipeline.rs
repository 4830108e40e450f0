//! Declarative description of the voice pipeline.
//!
//! Nothing here runs audio. The agent-session framework reads this description
//! from the worker's `session_config` message and builds the real components.
use indoc::indoc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::agent::Agent;
use crate::config::{AgentConfig, DEFAULT_OPENAI_MODEL};
use crate::models::tool::Tool;

pub const AGENT_INSTRUCTIONS: &str = indoc! {"
    You are a helpful voice AI assistant.
    You eagerly assist users with their questions by providing information from your extensive knowledge.
    Your responses are concise, to the point, and without any complex formatting or punctuation including emojis, asterisks, or other symbols.
    You are curious, friendly, and have a sense of humor.

    You have access to an external backend service that can provide specialized responses.
    Use the query_reevo_backend tool when users ask for CRM domain-specific information or
    when you need to consult the external service for specialized processing.
"};

pub const GREETING_INSTRUCTIONS: &str = "Greet the user warmly and introduce yourself as their Reevo AI assistant. Ask how you can help them today.";

pub const CARTESIA_VOICE: &str = "6f84f4b8-58a2-430c-8c79-688dad597532";

/// One hosted or local pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
    /// Environment key holding the credential this stage needs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_key: Option<String>,
}

impl ComponentSpec {
    pub fn new<S: Into<String>>(provider: S) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            options: Map::new(),
            env_key: None,
        }
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_option<S: Into<String>>(mut self, key: S, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_env_key<S: Into<String>>(mut self, env_key: S) -> Self {
        self.env_key = Some(env_key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub llm: ComponentSpec,
    pub stt: ComponentSpec,
    pub tts: ComponentSpec,
    pub vad: ComponentSpec,
    pub turn_detection: ComponentSpec,
    pub noise_cancellation: ComponentSpec,
    /// Let the model start answering before the end of the user's turn is confirmed
    pub preemptive_generation: bool,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self {
            llm: ComponentSpec::new("openai")
                .with_model(DEFAULT_OPENAI_MODEL)
                .with_env_key("OPENAI_API_KEY"),
            stt: ComponentSpec::new("deepgram")
                .with_model("nova-3")
                .with_option("language", json!("multi"))
                .with_env_key("DEEPGRAM_API_KEY"),
            tts: ComponentSpec::new("cartesia")
                .with_option("voice", json!(CARTESIA_VOICE))
                .with_env_key("CARTESIA_API_KEY"),
            vad: ComponentSpec::new("silero"),
            turn_detection: ComponentSpec::new("livekit").with_model("multilingual"),
            noise_cancellation: ComponentSpec::new("livekit").with_model("BVC"),
            preemptive_generation: true,
        }
    }
}

impl PipelineSpec {
    pub fn from_config(config: &AgentConfig) -> Self {
        let mut spec = Self::default();
        spec.llm.model = Some(config.openai.model.clone());
        spec
    }

    fn components(&self) -> [&ComponentSpec; 6] {
        [
            &self.llm,
            &self.stt,
            &self.tts,
            &self.vad,
            &self.turn_detection,
            &self.noise_cancellation,
        ]
    }

    /// Credentials the hosted stages need, in pipeline order
    pub fn required_env(&self) -> Vec<&str> {
        self.components()
            .iter()
            .filter_map(|component| component.env_key.as_deref())
            .collect()
    }
}

/// Everything the session framework needs to host the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub instructions: String,
    pub greeting: String,
    pub pipeline: PipelineSpec,
    pub tools: Vec<Tool>,
}

impl AgentDefinition {
    pub fn new(pipeline: PipelineSpec, tools: Vec<Tool>) -> Self {
        Self {
            instructions: AGENT_INSTRUCTIONS.to_string(),
            greeting: GREETING_INSTRUCTIONS.to_string(),
            pipeline,
            tools,
        }
    }

    /// Describe a running agent, taking its own instructions and tools
    pub fn for_agent(pipeline: PipelineSpec, agent: &Agent) -> Self {
        Self {
            instructions: agent.instructions().to_string(),
            ..Self::new(pipeline, agent.tools())
        }
    }
}
