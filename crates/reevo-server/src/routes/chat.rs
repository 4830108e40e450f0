//! Legacy `/chat` endpoint: answers every conversation with a canned meeting summary.
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use reevo::models::chat::ChatResponse;
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

pub const MEETING_SUMMARY: &[&str] = &[
    "Based on our records, ",
    "here are the details ",
    "of the meeting on September 10th: ",
    "\n\n",
    "**Meeting Summary:**\n",
    "- Date: September 10, 2024\n",
    "- Time: 2:00 PM - 3:30 PM EST\n",
    "- Attendees: Sarah Chen (Product Manager), ",
    "John Smith (Engineering Lead), ",
    "Maria Garcia (Design Lead), ",
    "and David Kim (QA Lead)\n",
    "\n**Key Discussion Points:**\n",
    "1. Q4 product roadmap review\n",
    "2. New authentication feature specifications\n",
    "3. Mobile app performance improvements\n",
    "4. Customer feedback analysis from beta testing\n",
    "\n**Action Items:**\n",
    "- Sarah to finalize feature requirements by 9/15\n",
    "- John to provide technical feasibility assessment\n",
    "- Maria to create UI mockups for new features\n",
    "- David to prepare test plan for upcoming sprint\n",
    "\n**Next Meeting:** September 17th at 2:00 PM",
];

/// The mock answers any conversation, messages are only counted
#[derive(Debug, Deserialize)]
struct MockChatRequest {
    messages: Vec<Value>,
    #[serde(default)]
    stream: Option<bool>,
}

fn wants_json(headers: &HeaderMap, request: &MockChatRequest) -> bool {
    if request.stream == Some(false) {
        return true;
    }
    headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false)
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<MockChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    info!(messages = request.messages.len(), "legacy chat request");

    if wants_json(&headers, &request) {
        let response = ChatResponse {
            response: MEETING_SUMMARY.concat(),
        };
        return Ok(Json(response).into_response());
    }

    let (tx, rx) = mpsc::channel::<Bytes>(4);
    let delay = state.chunk_delay;
    tokio::spawn(async move {
        for fragment in MEETING_SUMMARY {
            if tx.send(Bytes::from_static(fragment.as_bytes())).await.is_err() {
                debug!("client went away, stopping mock stream");
                return;
            }
            tokio::time::sleep(delay).await;
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    let mut response = Response::new(body);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Ok(response)
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Settings;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(delay_ms: u64) -> AppState {
        let mut state = AppState::new(&Settings::default()).unwrap();
        state.chunk_delay = Duration::from_millis(delay_ms);
        state
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .uri("/chat")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_streams_meeting_summary_in_fragments() {
        let app = routes(test_state(1));
        let response = app
            .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hello"}]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; charset=utf-8"
        );

        let mut body = response.into_body();
        let mut frames = 0;
        let mut text = String::new();
        while let Some(frame) = body.frame().await {
            if let Ok(data) = frame.unwrap().into_data() {
                frames += 1;
                text.push_str(std::str::from_utf8(&data).unwrap());
            }
        }
        assert_eq!(frames, MEETING_SUMMARY.len());
        assert_eq!(text, MEETING_SUMMARY.concat());
        assert!(text.starts_with("Based on our records"));
    }

    #[tokio::test]
    async fn test_json_response_on_request() {
        let app = routes(test_state(0));
        let response = app
            .oneshot(chat_request(
                r#"{"messages":[{"role":"user","content":"hello"}],"stream":false}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["response"], MEETING_SUMMARY.concat());

        let app = routes(test_state(0));
        let mut request = chat_request(r#"{"messages":[{"role":"user","content":"hello"}]}"#);
        request
            .headers_mut()
            .insert("accept", HeaderValue::from_static("application/json"));
        let response = app.oneshot(request).await.unwrap();
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
    }

    #[tokio::test]
    async fn test_answers_any_conversation() {
        for body in [
            r#"{"messages":[]}"#,
            r#"{"messages":[{"role":"robot","content":"hi"}]}"#,
            r#"{"messages":[{"role":"tool","content":"x","id":"m1"}],"chatId":"c-1"}"#,
        ] {
            let response = routes(test_state(0))
                .oneshot(chat_request(body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "body: {}", body);

            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(bytes, MEETING_SUMMARY.concat().as_bytes());
        }
    }

    #[tokio::test]
    async fn test_malformed_requests() {
        for body in [r#"{"messages": "#, r#"{}"#, r#"{"messages":"hello"}"#, "[]"] {
            let response = routes(test_state(0))
                .oneshot(chat_request(body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);

            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["error"]["code"], json!("malformed_request"));
        }
    }
}
