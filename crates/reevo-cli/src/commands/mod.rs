pub mod console;
pub mod download_files;
pub mod worker;

use anyhow::Result;
use reevo::agent::Agent;
use reevo::backend::BackendClient;
use reevo::config::AgentConfig;
use reevo::pipeline::AGENT_INSTRUCTIONS;
use reevo::providers::configs::OpenAiProviderConfig;
use reevo::providers::openai::OpenAiProvider;
use reevo::tools::standard_registry;
use std::sync::Arc;
use tracing::info;

/// The voice agent: OpenAI chat model plus every standard tool
pub fn build_agent(config: &AgentConfig) -> Result<Arc<Agent>> {
    let provider = OpenAiProvider::new(OpenAiProviderConfig::from_settings(&config.openai)?)?;
    let backend = BackendClient::new(config.backend.clone())?;
    info!(
        model = %config.openai.model,
        backend_mode = %config.backend.mode(),
        "building agent"
    );
    let registry = standard_registry(backend)?;
    Ok(Arc::new(Agent::new(
        Box::new(provider),
        registry,
        AGENT_INSTRUCTIONS,
    )))
}
