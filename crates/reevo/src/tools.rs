//! Functions the language model can call during a turn.
//!
//! Tools are registered explicitly by name in a [`ToolRegistry`]; the agent
//! hands the registry's schemas to the model and dispatches calls back through it.
pub mod backend_query;
pub mod registry;
pub mod weather;

pub use backend_query::{BackendQueryTool, FALLBACK_RESPONSE};
pub use registry::{ToolContext, ToolHandler, ToolRegistry};
pub use weather::WeatherTool;

use crate::backend::BackendClient;
use crate::errors::AgentResult;

/// Registry with every tool the voice agent offers
pub fn standard_registry(backend: BackendClient) -> AgentResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(BackendQueryTool::tool(), BackendQueryTool::new(backend))?;
    registry.register(WeatherTool::tool(), WeatherTool)?;
    Ok(registry)
}
