use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::configuration::Settings;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state.
///
/// Read-only once built, handlers never need to lock anything.
#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub upstream_url: Arc<str>,
    /// Bounds the wait for upstream headers, and every wait for the next body chunk
    pub upstream_timeout: Duration,
    pub chunk_delay: Duration,
}

impl AppState {
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            upstream_url: Arc::from(settings.upstream.url.as_str()),
            upstream_timeout: settings.upstream.timeout(),
            chunk_delay: Duration::from_millis(settings.mock.chunk_delay_ms),
        })
    }
}
