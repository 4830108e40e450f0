use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::error::BackendError;
use super::protocol::{DataStreamDecoder, Utf8Decoder};
use crate::config::{BackendConfig, BackendMode};
use crate::models::chat::{ChatMessage, ChatRequest};

pub const USER_ID_HEADER: &str = "x-reevo-user-id";
pub const ORG_ID_HEADER: &str = "x-reevo-org-id";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_ERROR_BODY: usize = 2048;

/// Where a request goes for the configured mode, and with which headers
#[derive(Debug, Clone)]
pub struct BackendRoute {
    pub mode: BackendMode,
    pub url: String,
    pub headers: HeaderMap,
}

/// HTTP client for the external backend, built once from the immutable configuration
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Resolve the URL and headers of the active mode
    pub fn route(&self) -> Result<BackendRoute, BackendError> {
        let mode = self.config.mode();
        let base = self.config.backend_url.trim_end_matches('/');
        let url = match mode {
            BackendMode::Legacy => format!("{}/chat", base),
            BackendMode::LocalProxy => format!("{}/api/v1/chat", base),
            BackendMode::DirectRemote => self.config.reevo_api_url.clone(),
        };

        let mut headers = HeaderMap::new();
        if mode.requires_credentials() {
            match (&self.config.auth_token, mode) {
                (Some(token), _) => {
                    headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
                }
                (None, BackendMode::DirectRemote) => return Err(BackendError::MissingToken(mode)),
                // the local proxy answers 401 itself, there is no point inventing a token
                (None, _) => {}
            }
            headers.insert(
                HeaderName::from_static(USER_ID_HEADER),
                header_value(&self.config.user_id)?,
            );
            headers.insert(
                HeaderName::from_static(ORG_ID_HEADER),
                header_value(&self.config.org_id)?,
            );
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(BackendRoute { mode, url, headers })
    }

    /// Send the conversation to the backend and collect its reply.
    ///
    /// Every decoded piece of text is handed to `on_chunk` as soon as it arrives, the
    /// complete text is returned at the end. The whole exchange is bounded by the
    /// configured timeout.
    pub async fn chat<F>(&self, messages: &[ChatMessage], mut on_chunk: F) -> Result<String, BackendError>
    where
        F: FnMut(&str) + Send,
    {
        let route = self.route()?;
        info!(mode = %route.mode, url = %route.url, messages = messages.len(), "calling external backend");

        let timeout = self.config.timeout;
        let exchange = self.exchange(route, messages, &mut on_chunk);
        let text = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| BackendError::Timeout(timeout))??;

        if text.trim().is_empty() {
            return Err(BackendError::MalformedResponse(
                "response contained no text".to_string(),
            ));
        }
        Ok(text)
    }

    async fn exchange<F>(
        &self,
        route: BackendRoute,
        messages: &[ChatMessage],
        on_chunk: &mut F,
    ) -> Result<String, BackendError>
    where
        F: FnMut(&str) + Send,
    {
        let response = self
            .client
            .post(&route.url)
            .headers(route.headers)
            .json(&ChatRequest::new(messages.to_vec()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(BackendError::Upstream { status, body });
        }

        let parse_stream = self.config.parse_stream && route.mode != BackendMode::Legacy;
        let mut utf8 = Utf8Decoder::new();
        let mut data_stream = DataStreamDecoder::new();
        let mut full = String::new();
        let mut chunks = 0usize;

        let mut emit = |text: String, full: &mut String| {
            if !text.is_empty() {
                on_chunk(&text);
                full.push_str(&text);
            }
        };

        let mut body = response.bytes_stream();
        while let Some(bytes) = body.next().await {
            let bytes = bytes?;
            chunks += 1;
            let text = utf8.push(&bytes);
            let text = if parse_stream { data_stream.push(&text) } else { text };
            emit(text, &mut full);
        }

        let tail = utf8.finish();
        let tail = if parse_stream {
            let mut tail = data_stream.push(&tail);
            tail.push_str(&data_stream.finish());
            tail
        } else {
            tail
        };
        emit(tail, &mut full);

        debug!(chunks, chars = full.len(), "external backend stream finished");
        Ok(full)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, BackendError> {
    HeaderValue::from_str(value)
        .map_err(|e| BackendError::MalformedResponse(format!("invalid header value: {}", e)))
}
