//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, dev-only overrides allowed
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main client settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Session/handle construction settings
    #[serde(default)]
    pub session: SessionSettings,

    /// Audio input device settings
    #[serde(default)]
    pub devices: DeviceSettings,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Settings every streaming client handle is built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Agent to connect to
    #[serde(default)]
    pub agent_id: String,

    /// Endpoint that authorizes a new session
    #[serde(default)]
    pub authorize_session_endpoint: Option<String>,

    /// Extra body sent with the authorization request
    #[serde(default)]
    pub authorize_session_request: serde_json::Value,

    /// Opaque metadata forwarded to the agent
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Explicit conversation identity (wins over server-assigned ids)
    #[serde(default)]
    pub conversation_id: Option<String>,

    #[serde(default = "default_true")]
    pub audio_input: bool,

    #[serde(default = "default_true")]
    pub audio_output: bool,

    #[serde(default = "default_true")]
    pub enable_vad: bool,

    #[serde(default = "default_true")]
    pub enable_amplitude_monitoring: bool,

    /// Transport endpoint override (development only)
    #[serde(default)]
    pub transport_endpoint_override: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            authorize_session_endpoint: None,
            authorize_session_request: serde_json::Value::Null,
            metadata: serde_json::Map::new(),
            conversation_id: None,
            audio_input: true,
            audio_output: true,
            enable_vad: true,
            enable_amplitude_monitoring: true,
            transport_endpoint_override: None,
        }
    }
}

/// Audio input device settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceSettings {
    /// Enumerate and watch devices as soon as monitoring starts.
    ///
    /// When false nothing is enumerated until audio input is explicitly
    /// enabled, so the user is never prompted for microphone access first.
    #[serde(default)]
    pub enumerate_on_start: bool,

    /// Initial sticky preference (e.g. restored by the host application)
    #[serde(default)]
    pub preferred_input_device_id: Option<String>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level / `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings for the given agent
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        let mut settings = Self::default();
        settings.session.agent_id = agent_id.into();
        settings
    }

    /// Parse and validate settings from an inline TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_session()?;
        self.validate_observability()?;
        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        let session = &self.session;

        if session.agent_id.trim().is_empty() {
            return Err(ConfigError::MissingField("session.agent_id".to_string()));
        }

        if let Some(endpoint) = &session.authorize_session_endpoint {
            if !is_http_url(endpoint) {
                return Err(ConfigError::InvalidValue {
                    field: "session.authorize_session_endpoint".to_string(),
                    message: format!("Expected an http(s) URL, got '{}'", endpoint),
                });
            }
        }

        if !matches!(
            session.authorize_session_request,
            serde_json::Value::Null | serde_json::Value::Object(_)
        ) {
            return Err(ConfigError::InvalidValue {
                field: "session.authorize_session_request".to_string(),
                message: "Must be a table/object".to_string(),
            });
        }

        if let Some(endpoint) = &session.transport_endpoint_override {
            if self.environment.is_strict() {
                return Err(ConfigError::InvalidValue {
                    field: "session.transport_endpoint_override".to_string(),
                    message: format!(
                        "Development-only override is not allowed in {:?}",
                        self.environment
                    ),
                });
            }
            tracing::warn!(
                endpoint = %endpoint,
                "Transport endpoint override active (development only)"
            );
        }

        Ok(())
    }

    fn validate_observability(&self) -> Result<(), ConfigError> {
        if self.observability.log_level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "observability.log_level".to_string(),
                message: "Log level cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

/// Load settings from `config/` and the environment
///
/// Priority: env vars > config/{env}.* > config/default.* > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Load settings rooted at `dir`
pub fn load_settings_from(dir: impl AsRef<Path>, env: Option<&str>) -> Result<Settings, ConfigError> {
    let dir = dir.as_ref();
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(
        File::with_name(&dir.join("default").to_string_lossy()).required(false),
    );

    // Load environment-specific config
    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&dir.join(env_name).to_string_lossy()).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("VOICE_CLIENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    // Validate
    settings.validate()?;

    tracing::debug!(
        dir = %dir.display(),
        env = env.unwrap_or("default"),
        agent_id = %settings.session.agent_id,
        "Settings loaded"
    );

    Ok(settings)
}
