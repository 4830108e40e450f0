use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use strum_macros::{Display, EnumIter};
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_REEVO_API_URL: &str = "https://api-private.reevo.ai/api/v1/chat";
pub const DEFAULT_REEVO_ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
pub const DEFAULT_OPENAI_HOST: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid value for {env_var}: {reason}")]
    InvalidValue { env_var: String, reason: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Convert a configuration key path into the environment variable that sets it
pub fn to_env_var(field_path: &str) -> String {
    field_path.replace('.', "_").to_uppercase()
}

/// Where the backend tool sends its requests.
///
/// Exactly one mode is active per process, derived from `USE_REEVO_API` and
/// `USE_DIRECT_REEVO_API`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum BackendMode {
    /// Plain `/chat` on the local backend, no credentials
    #[strum(serialize = "legacy")]
    Legacy,
    /// `/api/v1/chat` on the local backend, which forwards to Reevo
    #[strum(serialize = "local-proxy")]
    LocalProxy,
    /// The Reevo API itself, bypassing the local backend
    #[strum(serialize = "direct-remote")]
    DirectRemote,
}

impl BackendMode {
    pub fn from_flags(use_reevo_api: bool, use_direct_reevo_api: bool) -> Self {
        match (use_reevo_api, use_direct_reevo_api) {
            (_, true) => BackendMode::DirectRemote,
            (true, false) => BackendMode::LocalProxy,
            (false, false) => BackendMode::Legacy,
        }
    }

    pub fn requires_credentials(&self) -> bool {
        !matches!(self, BackendMode::Legacy)
    }
}

/// Settings of the external backend tool
#[derive(Clone)]
pub struct BackendConfig {
    pub backend_url: String,
    pub reevo_api_url: String,
    pub use_reevo_api: bool,
    pub use_direct_reevo_api: bool,
    pub auth_token: Option<String>,
    pub user_id: String,
    pub org_id: String,
    pub parse_stream: bool,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn mode(&self) -> BackendMode {
        BackendMode::from_flags(self.use_reevo_api, self.use_direct_reevo_api)
    }

    /// A legacy-mode configuration pointed at the given local backend
    pub fn legacy<S: Into<String>>(backend_url: S) -> Self {
        Self {
            backend_url: backend_url.into(),
            use_reevo_api: false,
            ..Self::default()
        }
    }

    pub fn with_auth<T: Into<String>>(mut self, token: T) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mode() == BackendMode::DirectRemote && self.auth_token.is_none() {
            return Err(ConfigError::MissingEnvVar {
                env_var: "REEVO_JWT_TOKEN".to_string(),
            });
        }
        for (env_var, value) in [
            ("EXTERNAL_BACKEND_URL", &self.backend_url),
            ("REEVO_API_URL", &self.reevo_api_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
                env_var: env_var.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            reevo_api_url: DEFAULT_REEVO_API_URL.to_string(),
            use_reevo_api: true,
            use_direct_reevo_api: false,
            auth_token: None,
            user_id: DEFAULT_REEVO_ID.to_string(),
            org_id: DEFAULT_REEVO_ID.to_string(),
            parse_stream: true,
            timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("backend_url", &self.backend_url)
            .field("reevo_api_url", &self.reevo_api_url)
            .field("mode", &self.mode())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .field("org_id", &self.org_id)
            .field("parse_stream", &self.parse_stream)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct LiveKitSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl fmt::Debug for LiveKitSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitSettings")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Clone)]
pub struct OpenAiSettings {
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("host", &self.host)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish()
    }
}

/// Process wide configuration, read once at startup and never mutated afterwards
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub backend: BackendConfig,
    pub openai: OpenAiSettings,
    pub livekit: LiveKitSettings,
    pub deepgram_api_key: Option<String>,
    pub cartesia_api_key: Option<String>,
    pub model_cache_dir: Option<PathBuf>,
}

// Mirrors the environment variable names, lowercased by the config crate
#[derive(Debug, Deserialize)]
struct RawSettings {
    external_backend_url: String,
    reevo_api_url: String,
    use_reevo_api: bool,
    use_direct_reevo_api: bool,
    reevo_parse_stream: bool,
    external_backend_timeout_secs: u64,
    reevo_jwt_token: Option<String>,
    reevo_user_id: String,
    reevo_org_id: String,
    openai_host: String,
    openai_model: String,
    openai_api_key: Option<String>,
    livekit_url: Option<String>,
    livekit_api_key: Option<String>,
    livekit_api_secret: Option<String>,
    deepgram_api_key: Option<String>,
    cartesia_api_key: Option<String>,
    model_cache_dir: Option<String>,
}

impl AgentConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default().try_parsing(true))
    }

    /// Load from an explicit set of variables instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(Environment::default().try_parsing(true).source(Some(vars)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("external_backend_url", DEFAULT_BACKEND_URL)?
            .set_default("reevo_api_url", DEFAULT_REEVO_API_URL)?
            .set_default("use_reevo_api", true)?
            .set_default("use_direct_reevo_api", false)?
            .set_default("reevo_parse_stream", true)?
            .set_default("external_backend_timeout_secs", DEFAULT_BACKEND_TIMEOUT_SECS)?
            .set_default("reevo_user_id", DEFAULT_REEVO_ID)?
            .set_default("reevo_org_id", DEFAULT_REEVO_ID)?
            .set_default("openai_host", DEFAULT_OPENAI_HOST)?
            .set_default("openai_model", DEFAULT_OPENAI_MODEL)?
            .add_source(environment)
            .build()?;

        let raw: RawSettings = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            match &err {
                config::ConfigError::NotFound(field) => ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                },
                _ => ConfigError::Other(err),
            }
        })?;

        let settings = Self {
            backend: BackendConfig {
                backend_url: raw.external_backend_url,
                reevo_api_url: raw.reevo_api_url,
                use_reevo_api: raw.use_reevo_api,
                use_direct_reevo_api: raw.use_direct_reevo_api,
                auth_token: non_empty(raw.reevo_jwt_token),
                user_id: raw.reevo_user_id,
                org_id: raw.reevo_org_id,
                parse_stream: raw.reevo_parse_stream,
                timeout: Duration::from_secs(raw.external_backend_timeout_secs),
            },
            openai: OpenAiSettings {
                host: raw.openai_host,
                api_key: non_empty(raw.openai_api_key),
                model: raw.openai_model,
            },
            livekit: LiveKitSettings {
                url: non_empty(raw.livekit_url),
                api_key: non_empty(raw.livekit_api_key),
                api_secret: non_empty(raw.livekit_api_secret),
            },
            deepgram_api_key: non_empty(raw.deepgram_api_key),
            cartesia_api_key: non_empty(raw.cartesia_api_key),
            model_cache_dir: non_empty(raw.model_cache_dir).map(PathBuf::from),
        };
        settings.backend.validate()?;
        Ok(settings)
    }

    /// Keys needed to chat with the agent from a terminal
    pub fn require_console(&self) -> Result<(), ConfigError> {
        require(&self.openai.api_key, "OPENAI_API_KEY")
    }

    /// Keys needed to run the full voice pipeline under the session framework
    pub fn require_worker(&self) -> Result<(), ConfigError> {
        require(&self.livekit.url, "LIVEKIT_URL")?;
        require(&self.livekit.api_key, "LIVEKIT_API_KEY")?;
        require(&self.livekit.api_secret, "LIVEKIT_API_SECRET")?;
        require(&self.openai.api_key, "OPENAI_API_KEY")?;
        require(&self.deepgram_api_key, "DEEPGRAM_API_KEY")?;
        require(&self.cartesia_api_key, "CARTESIA_API_KEY")
    }

    /// Directory model weight files are downloaded into
    pub fn model_dir(&self) -> PathBuf {
        self.model_cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("reevo")
                .join("models")
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn require(value: &Option<String>, env_var: &str) -> Result<(), ConfigError> {
    match value {
        Some(_) => Ok(()),
        None => Err(ConfigError::MissingEnvVar {
            env_var: env_var.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_settings() {
        let config = AgentConfig::from_vars(HashMap::new()).unwrap();

        assert_eq!(config.backend.backend_url, "http://localhost:8000");
        assert_eq!(config.backend.mode(), BackendMode::LocalProxy);
        assert_eq!(config.backend.user_id, DEFAULT_REEVO_ID);
        assert_eq!(config.backend.org_id, DEFAULT_REEVO_ID);
        assert_eq!(config.backend.auth_token, None);
        assert!(config.backend.parse_stream);
        assert_eq!(config.backend.timeout, Duration::from_secs(30));
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.api_key, None);
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(BackendMode::from_flags(false, false), BackendMode::Legacy);
        assert_eq!(BackendMode::from_flags(true, false), BackendMode::LocalProxy);
        assert_eq!(BackendMode::from_flags(true, true), BackendMode::DirectRemote);
        assert_eq!(BackendMode::from_flags(false, true), BackendMode::DirectRemote);
        assert_eq!(BackendMode::DirectRemote.to_string(), "direct-remote");

        let names: Vec<String> = BackendMode::iter().map(|m| m.to_string()).collect();
        assert_eq!(names, vec!["legacy", "local-proxy", "direct-remote"]);
        let with_credentials = BackendMode::iter()
            .filter(BackendMode::requires_credentials)
            .count();
        assert_eq!(with_credentials, 2);
    }

    #[test]
    fn test_environment_override() {
        let config = AgentConfig::from_vars(vars(&[
            ("EXTERNAL_BACKEND_URL", "http://backend.internal:9000"),
            ("USE_REEVO_API", "false"),
            ("REEVO_USER_ID", "user-1"),
            ("REEVO_ORG_ID", "org-1"),
            ("EXTERNAL_BACKEND_TIMEOUT_SECS", "5"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();

        assert_eq!(config.backend.backend_url, "http://backend.internal:9000");
        assert_eq!(config.backend.mode(), BackendMode::Legacy);
        assert_eq!(config.backend.user_id, "user-1");
        assert_eq!(config.backend.org_id, "org-1");
        assert_eq!(config.backend.timeout, Duration::from_secs(5));
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_direct_mode_requires_token() {
        let err = AgentConfig::from_vars(vars(&[("USE_DIRECT_REEVO_API", "true")])).unwrap_err();
        match err {
            ConfigError::MissingEnvVar { env_var } => assert_eq!(env_var, "REEVO_JWT_TOKEN"),
            other => panic!("unexpected error: {other}"),
        }

        let blank = AgentConfig::from_vars(vars(&[
            ("USE_DIRECT_REEVO_API", "true"),
            ("REEVO_JWT_TOKEN", "  "),
        ]));
        assert!(blank.is_err());

        let config = AgentConfig::from_vars(vars(&[
            ("USE_DIRECT_REEVO_API", "true"),
            ("REEVO_JWT_TOKEN", "jwt"),
        ]))
        .unwrap();
        assert_eq!(config.backend.mode(), BackendMode::DirectRemote);
    }

    #[test]
    fn test_invalid_backend_url() {
        let err = AgentConfig::from_vars(vars(&[("EXTERNAL_BACKEND_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_worker_requirements() {
        let config = AgentConfig::from_vars(vars(&[
            ("LIVEKIT_URL", "wss://example.livekit.cloud"),
            ("LIVEKIT_API_KEY", "key"),
            ("LIVEKIT_API_SECRET", "secret"),
            ("OPENAI_API_KEY", "sk-test"),
            ("DEEPGRAM_API_KEY", "dg"),
        ]))
        .unwrap();

        assert!(config.require_console().is_ok());
        match config.require_worker().unwrap_err() {
            ConfigError::MissingEnvVar { env_var } => assert_eq!(env_var, "CARTESIA_API_KEY"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AgentConfig::from_vars(vars(&[
            ("REEVO_JWT_TOKEN", "super-secret-jwt"),
            ("LIVEKIT_API_SECRET", "livekit-secret"),
            ("OPENAI_API_KEY", "sk-secret"),
        ]))
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-jwt"));
        assert!(!rendered.contains("livekit-secret"));
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("reevo_jwt_token"), "REEVO_JWT_TOKEN");
        assert_eq!(to_env_var("server.port"), "SERVER_PORT");
    }
}
