//! Machine readable description of the chat endpoints, served at `/docs`.
use axum::routing::get;
use axum::{Json, Router};
use reevo::backend::client::{ORG_ID_HEADER, USER_ID_HEADER};
use serde_json::{json, Value};

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Error"}}}
    })
}

fn header_parameter(name: &str) -> Value {
    json!({"name": name, "in": "header", "required": true, "schema": {"type": "string"}})
}

pub fn openapi() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Reevo external backend",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Mock and proxy for the Reevo chat API used by the voice agent"
        },
        "paths": {
            "/chat": {
                "post": {
                    "summary": "Legacy chat, answers any conversation with a canned meeting summary",
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/MockChatRequest"}}}
                    },
                    "responses": {
                        "200": {
                            "description": "Streamed text, or a JSON body when `stream` is false or JSON is accepted",
                            "content": {
                                "text/plain": {"schema": {"type": "string"}},
                                "application/json": {"schema": {"$ref": "#/components/schemas/ChatResponse"}}
                            }
                        },
                        "400": error_response("Malformed request")
                    }
                }
            },
            "/api/v1/chat": {
                "post": {
                    "summary": "Forward a chat to the Reevo API and relay its streamed answer",
                    "security": [{"bearerAuth": []}],
                    "parameters": [header_parameter(USER_ID_HEADER), header_parameter(ORG_ID_HEADER)],
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ChatRequest"}}}
                    },
                    "responses": {
                        "200": {
                            "description": "Upstream data stream, relayed unchanged",
                            "content": {"text/plain": {"schema": {"type": "string"}}}
                        },
                        "400": error_response("Malformed request"),
                        "401": error_response("Missing or invalid credentials"),
                        "502": error_response("Upstream unreachable"),
                        "504": error_response("Upstream timed out")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Liveness probe",
                    "responses": {"200": {"description": "Server is up"}}
                }
            }
        },
        "components": {
            "securitySchemes": {
                "bearerAuth": {"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}
            },
            "schemas": {
                "ChatMessage": {
                    "type": "object",
                    "required": ["role", "content"],
                    "properties": {
                        "role": {"type": "string", "enum": ["system", "user", "assistant"]},
                        "content": {"type": "string"}
                    }
                },
                "MockChatRequest": {
                    "type": "object",
                    "required": ["messages"],
                    "properties": {
                        "messages": {"type": "array", "items": {"type": "object"}},
                        "stream": {"type": "boolean"}
                    }
                },
                "ChatRequest": {
                    "type": "object",
                    "description": "Forwarded byte for byte, fields beyond these are passed through",
                    "required": ["messages"],
                    "properties": {
                        "messages": {
                            "type": "array",
                            "minItems": 1,
                            "items": {"$ref": "#/components/schemas/ChatMessage"}
                        },
                        "stream": {"type": "boolean"}
                    }
                },
                "ChatResponse": {
                    "type": "object",
                    "required": ["response"],
                    "properties": {"response": {"type": "string"}}
                },
                "Error": {
                    "type": "object",
                    "required": ["error"],
                    "properties": {
                        "error": {
                            "type": "object",
                            "required": ["code", "message"],
                            "properties": {
                                "code": {
                                    "type": "string",
                                    "enum": ["unauthorized", "malformed_request", "upstream_unreachable", "upstream_timeout"]
                                },
                                "message": {"type": "string"}
                            }
                        }
                    }
                }
            }
        }
    })
}

async fn docs() -> Json<Value> {
    Json(openapi())
}

pub fn routes() -> Router {
    Router::new().route("/docs", get(docs))
}
