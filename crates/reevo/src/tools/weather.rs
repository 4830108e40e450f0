use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::registry::{ToolContext, ToolHandler};
use crate::errors::AgentResult;
use crate::models::tool::Tool;

pub const WEATHER_TOOL_NAME: &str = "lookup_weather";

#[derive(Debug, Deserialize)]
struct WeatherParams {
    location: String,
}

/// Canned weather lookup
pub struct WeatherTool;

impl WeatherTool {
    pub fn tool() -> Tool {
        Tool::new(
            WEATHER_TOOL_NAME,
            "Use this tool to look up current weather information in the given location. \
             If the location is not supported by the weather service, the tool will indicate this. \
             You must tell the user the location's weather is unavailable.",
            json!({
                "type": "object",
                "required": ["location"],
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The location to look up weather information for (e.g. city name)"
                    }
                }
            }),
        )
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    async fn call(&self, arguments: Value, ctx: &ToolContext) -> AgentResult<String> {
        let params: WeatherParams = serde_json::from_value(arguments)?;
        info!(location = %params.location, "looking up weather");

        ctx.generate_reply("Say 'Let me check the weather' - keep it very brief");

        Ok("sunny with a temperature of 70 degrees.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use crate::session::events::{EventSink, SessionEvent};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_weather_requests_filler_and_answers() {
        let (events, mut rx) = EventSink::channel();
        let ctx = ToolContext::new(1, "call_w", Arc::from(Vec::new()), events);

        let result = WeatherTool
            .call(json!({"location": "Austin"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "sunny with a temperature of 70 degrees.");
        assert!(matches!(
            rx.recv().await,
            Some(SessionEvent::GenerateReply { .. })
        ));
    }

    #[tokio::test]
    async fn test_weather_requires_location() {
        let ctx = ToolContext::detached("call_w");
        let result = WeatherTool.call(json!({}), &ctx).await;
        assert!(matches!(result, Err(AgentError::InvalidParameters(_))));
    }
}
