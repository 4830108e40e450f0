//! Vendor style `/api/v1/chat`: checks credentials, then relays to the upstream Reevo API.
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use reevo::backend::client::{ORG_ID_HEADER, USER_ID_HEADER};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

const RELAY_BUFFER: usize = 16;

/// Caller identity, every part is required
#[derive(Debug, Clone, PartialEq)]
struct Credentials {
    token: String,
    user_id: String,
    org_id: String,
}

impl Credentials {
    fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let token = header_text(headers, header::AUTHORIZATION.as_str())
            .and_then(|value| value.split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ApiError::Unauthorized("missing or invalid bearer token".to_string())
            })?;
        let user_id = header_text(headers, USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;
        let org_id = header_text(headers, ORG_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", ORG_ID_HEADER)))?;

        Ok(Self {
            token: token.to_string(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
        })
    }
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The body is relayed as sent, it only has to be JSON carrying at least one message
fn message_count(body: &[u8]) -> Result<usize, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::MalformedRequest(format!("body is not valid JSON: {}", e)))?;
    match value.get("messages").and_then(Value::as_array) {
        Some(messages) if !messages.is_empty() => Ok(messages.len()),
        Some(_) => Err(ApiError::MalformedRequest(
            "messages must contain at least one message".to_string(),
        )),
        None => Err(ApiError::MalformedRequest(
            "messages must be an array".to_string(),
        )),
    }
}

fn upstream_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::UpstreamTimeout(format!("upstream did not answer in time: {}", error))
    } else {
        ApiError::UpstreamUnreachable(format!("could not reach upstream: {}", error))
    }
}

async fn proxy_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // credentials are checked before the body is looked at
    let credentials = Credentials::from_headers(&headers)?;
    let messages = message_count(&body)?;

    info!(
        user_id = %credentials.user_id,
        org_id = %credentials.org_id,
        messages,
        upstream = %state.upstream_url,
        "forwarding chat request"
    );

    let send = state
        .client
        .post(&*state.upstream_url)
        .bearer_auth(&credentials.token)
        .header(USER_ID_HEADER, &credentials.user_id)
        .header(ORG_ID_HEADER, &credentials.org_id)
        .header(reqwest::header::ACCEPT, "application/json")
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send();

    let upstream = tokio::time::timeout(state.upstream_timeout, send)
        .await
        .map_err(|_| {
            ApiError::UpstreamTimeout(format!(
                "upstream did not answer within {:?}",
                state.upstream_timeout
            ))
        })?
        .map_err(upstream_error)?;

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| HeaderValue::from_bytes(value.as_bytes()).ok());
    if !status.is_success() {
        warn!(%status, "upstream answered with an error, relaying it");
    }

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(RELAY_BUFFER);
    let idle_timeout = state.upstream_timeout;
    let mut body = upstream.bytes_stream();
    tokio::spawn(async move {
        let mut chunks = 0usize;
        loop {
            let next = match tokio::time::timeout(idle_timeout, body.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(chunks, "upstream went idle, ending relayed body");
                    break;
                }
            };
            let item = match next {
                Some(Ok(bytes)) => Ok(bytes),
                Some(Err(e)) => {
                    warn!(error = %e, "upstream body failed mid-stream");
                    Err(std::io::Error::new(std::io::ErrorKind::Other, e))
                }
                None => break,
            };
            let failed = item.is_err();
            if tx.send(item).await.is_err() {
                debug!(chunks, "client went away, dropping upstream stream");
                break;
            }
            if failed {
                break;
            }
            chunks += 1;
        }
        debug!(chunks, "upstream relay finished");
    });

    let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/chat", post(proxy_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{Settings, UpstreamSettings};
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, body_string, header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = r#"{"messages":[{"role":"user","content":"meetings on 9/10?"}]}"#;

    fn state_for(url: String) -> AppState {
        let settings = Settings {
            upstream: UpstreamSettings {
                url,
                timeout_secs: 30,
            },
            ..Settings::default()
        };
        AppState::new(&settings).unwrap()
    }

    fn authorized(body: &str) -> Request<Body> {
        Request::builder()
            .uri("/api/v1/chat")
            .method("POST")
            .header("content-type", "application/json")
            .header("authorization", "Bearer jwt-123")
            .header(USER_ID_HEADER, "user-1")
            .header(ORG_ID_HEADER, "org-1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn error_code(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        value["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_missing_credentials_never_reach_upstream() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;

        let requests = [
            ("authorization", None),
            (USER_ID_HEADER, None),
            (ORG_ID_HEADER, None),
            ("authorization", Some("Basic abc")),
            ("authorization", Some("Bearer ")),
        ];
        for (name, replacement) in requests {
            let mut request = authorized(BODY);
            request.headers_mut().remove(name);
            if let Some(value) = replacement {
                request
                    .headers_mut()
                    .insert(name, HeaderValue::from_static(value));
            }
            let response = routes(state_for(upstream.uri()))
                .oneshot(request)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(error_code(response).await, "unauthorized");
        }
    }

    #[tokio::test]
    async fn test_relays_upstream_stream() {
        let upstream = MockServer::start().await;
        let stream_body = "0:\"Two meetings\"\n0:\" on 9/10\"\nd:{\"finishReason\":\"stop\"}\n";
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .and(header_is("authorization", "Bearer jwt-123"))
            .and(header_is(USER_ID_HEADER, "user-1"))
            .and(header_is(ORG_ID_HEADER, "org-1"))
            .and(body_json(json!({
                "messages": [{"role": "user", "content": "meetings on 9/10?"}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(stream_body, "text/plain; charset=utf-8"),
            )
            .expect(1)
            .mount(&upstream)
            .await;

        let app = routes(state_for(format!("{}/api/v1/chat", upstream.uri())));
        let response = app.oneshot(authorized(BODY)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, stream_body.as_bytes());
    }

    #[tokio::test]
    async fn test_upstream_errors_are_relayed_unchanged() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("{\"detail\":\"forbidden\"}"))
            .mount(&upstream)
            .await;

        let response = routes(state_for(upstream.uri()))
            .oneshot(authorized(BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "{\"detail\":\"forbidden\"}".as_bytes());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let response = routes(state_for(format!("http://{}/api/v1/chat", addr)))
            .oneshot(authorized(BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(error_code(response).await, "upstream_unreachable");
    }

    #[tokio::test]
    async fn test_slow_upstream_is_504() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&upstream)
            .await;

        let mut state = state_for(upstream.uri());
        state.upstream_timeout = Duration::from_millis(200);
        let response = routes(state).oneshot(authorized(BODY)).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error_code(response).await, "upstream_timeout");
    }

    #[tokio::test]
    async fn test_malformed_body_after_auth() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;

        for body in [
            r#"{"messages":[]}"#,
            r#"{"messages":"hi"}"#,
            r#"{"chatId":"c-1"}"#,
            "not json",
        ] {
            let response = routes(state_for(upstream.uri()))
                .oneshot(authorized(body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(error_code(response).await, "malformed_request");
        }
    }

    #[tokio::test]
    async fn test_vendor_fields_are_forwarded_untouched() {
        let sent = r#"{"messages":[{"role":"user","content":"hi","id":"m1"}],"chatId":"c-42"}"#;
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string(sent))
            .and(header_is("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0:\"ok\"\n"))
            .expect(1)
            .mount(&upstream)
            .await;

        let response = routes(state_for(upstream.uri()))
            .oneshot(authorized(sent))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bearer_scheme_is_case_insensitive() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_is("authorization", "Bearer jwt-123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&upstream)
            .await;

        for value in ["bearer jwt-123", "BEARER jwt-123"] {
            let mut request = authorized(BODY);
            request
                .headers_mut()
                .insert("authorization", HeaderValue::from_static(value));
            let response = routes(state_for(upstream.uri()))
                .oneshot(request)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "scheme: {}", value);
        }
    }
}
