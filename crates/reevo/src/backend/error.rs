use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Could not reach the backend: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Backend returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("No Reevo token configured for {0} mode")]
    MissingToken(crate::config::BackendMode),
}

impl BackendError {
    /// Whether the failure happened before any response was received
    pub fn is_connection_failure(&self) -> bool {
        match self {
            BackendError::Network(e) => e.is_connect() || e.is_timeout(),
            BackendError::Timeout(_) => true,
            _ => false,
        }
    }
}
