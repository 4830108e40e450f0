use config::{Config, Environment};
use reevo::config::{ConfigError, DEFAULT_REEVO_API_URL};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                env_var: server_env_var("server.host"),
                reason: e.to_string(),
            })
    }
}

/// The vendor chat endpoint `/api/v1/chat` forwards to
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UpstreamSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MockSettings {
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub mock: MockSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("upstream.url", default_upstream_url())?
            .set_default("upstream.timeout_secs", default_timeout_secs())?
            .set_default("mock.chunk_delay_ms", default_chunk_delay_ms())?
            .add_source(
                Environment::with_prefix("REEVO_BACKEND")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            match &err {
                config::ConfigError::NotFound(field) => ConfigError::MissingEnvVar {
                    env_var: server_env_var(field),
                },
                _ => ConfigError::Other(err),
            }
        })?;

        settings.server.socket_addr()?;
        reqwest::Url::parse(&settings.upstream.url).map_err(|e| ConfigError::InvalidValue {
            env_var: server_env_var("upstream.url"),
            reason: e.to_string(),
        })?;
        Ok(settings)
    }
}

fn server_env_var(field: &str) -> String {
    format!("REEVO_BACKEND_{}", field.replace('.', "__").to_uppercase())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_upstream_url() -> String {
    DEFAULT_REEVO_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_chunk_delay_ms() -> u64 {
    50
}
