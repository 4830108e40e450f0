//! Newline delimited JSON spoken between the worker and the session framework.
//!
//! Inbound, one command per line:
//! `{"type":"user_turn","text":"..."}`, `{"type":"interrupt"}`, `{"type":"shutdown"}`.
//! Outbound, the first line is `{"type":"session_config",...}` and every
//! following line is a [`SessionEvent`].
use reevo::pipeline::AgentDefinition;
use reevo::session::events::SessionEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Final transcript of what the user said
    UserTurn { text: String },
    /// The user started speaking over the agent
    Interrupt,
    Shutdown,
}

#[derive(Serialize)]
#[serde(tag = "type", rename = "session_config")]
struct SessionConfig<'a> {
    #[serde(flatten)]
    definition: &'a AgentDefinition,
}

/// Blank lines carry no command
pub fn parse_command(line: &str) -> serde_json::Result<Option<WorkerCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

pub fn session_config_line(definition: &AgentDefinition) -> serde_json::Result<String> {
    serde_json::to_string(&SessionConfig { definition })
}

pub fn event_line(event: &SessionEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reevo::pipeline::PipelineSpec;
    use serde_json::Value;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command(r#"{"type":"user_turn","text":"what's on my calendar?"}"#).unwrap(),
            Some(WorkerCommand::UserTurn {
                text: "what's on my calendar?".to_string()
            })
        );
        assert_eq!(
            parse_command("{\"type\":\"interrupt\"}\n").unwrap(),
            Some(WorkerCommand::Interrupt)
        );
        assert_eq!(
            parse_command(r#"{"type":"shutdown"}"#).unwrap(),
            Some(WorkerCommand::Shutdown)
        );
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_unknown_commands() {
        assert!(parse_command(r#"{"type":"dance"}"#).is_err());
        assert!(parse_command(r#"{"type":"user_turn"}"#).is_err());
        assert!(parse_command("user_turn hello").is_err());
    }

    #[test]
    fn test_session_config_line() {
        let definition = AgentDefinition::new(PipelineSpec::default(), Vec::new());
        let line = session_config_line(&definition).unwrap();
        assert!(!line.contains('\n'));

        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "session_config");
        assert_eq!(value["greeting"], definition.greeting);
        assert_eq!(value["pipeline"]["llm"]["model"], "gpt-4o-mini");
        assert!(value["tools"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_event_line() {
        let line = event_line(&SessionEvent::Speak {
            turn: 2,
            text: "Two meetings today.".to_string(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "speak");
        assert_eq!(value["turn"], 2);
        assert_eq!(value["text"], "Two meetings today.");
    }
}
