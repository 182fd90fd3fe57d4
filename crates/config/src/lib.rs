//! Configuration management for the voice agent client session
//!
//! Supports loading configuration from:
//! - TOML/YAML/JSON files (`config/default`, `config/{env}`)
//! - Environment variables (VOICE_CLIENT__ prefix)
//! - Inline TOML

pub mod settings;

pub use settings::{
    load_settings, load_settings_from, DeviceSettings, LogFormat, ObservabilityConfig,
    RuntimeEnvironment, SessionSettings, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for voice_client_core::Error {
    fn from(err: ConfigError) -> Self {
        voice_client_core::Error::Config(err.to_string())
    }
}
