//! Session lifecycle types: status, generation tags and client events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::device::DeviceRecord;

/// Connection status as reported by the streaming client
///
/// ```text
/// initializing -> connecting -> connected -> (disconnected | error)
/// ```
///
/// `Disconnected` and `Error` are terminal for one handle. A new connect
/// starts a fresh run of the same machine on a new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Initializing,
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Error,
}

impl SessionStatus {
    /// Terminal for the handle that reported it
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic tag identifying one client handle instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted by a streaming client handle
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Session established; carries the server-resolved conversation id
    Connect {
        conversation_id: Option<String>,
        agent_config: Option<serde_json::Value>,
    },
    Disconnect {
        reason: Option<String>,
    },
    Error {
        message: String,
    },
    StatusChange(SessionStatus),
    UserAmplitude(f32),
    AgentAmplitude(f32),
    UserSpeaking(bool),
    AgentSpeaking(bool),
    MuteChange(bool),
    /// The audio layer moved to another input (explicitly or by re-route)
    DeviceSwitched {
        device_id: Option<String>,
    },
    DevicesChanged(Vec<DeviceRecord>),
    DataMessage(serde_json::Value),
    Message(serde_json::Value),
}

impl ClientEvent {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::Error { .. } => "error",
            Self::StatusChange(_) => "status_change",
            Self::UserAmplitude(_) => "user_amplitude",
            Self::AgentAmplitude(_) => "agent_amplitude",
            Self::UserSpeaking(_) => "user_speaking",
            Self::AgentSpeaking(_) => "agent_speaking",
            Self::MuteChange(_) => "mute_change",
            Self::DeviceSwitched { .. } => "device_switched",
            Self::DevicesChanged(_) => "devices_changed",
            Self::DataMessage(_) => "data_message",
            Self::Message(_) => "message",
        }
    }
}

type EventCallback = Arc<dyn Fn(Generation, ClientEvent) + Send + Sync>;

/// Channel a client handle uses to report events back to its owner
///
/// Every sink is minted for exactly one handle generation. The owner
/// discards events whose generation is no longer current.
#[derive(Clone)]
pub struct ClientEventSink {
    generation: Generation,
    callback: EventCallback,
}

impl ClientEventSink {
    pub fn new(
        generation: Generation,
        callback: impl Fn(Generation, ClientEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            generation,
            callback: Arc::new(callback),
        }
    }

    /// Sink that drops everything (useful for detached clients)
    pub fn noop() -> Self {
        Self::new(Generation::default(), |_, _| {})
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn emit(&self, event: ClientEvent) {
        (self.callback)(self.generation, event);
    }
}

impl fmt::Debug for ClientEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientEventSink")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Configuration a client handle is constructed with
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub agent_id: String,
    pub conversation_id: Option<String>,
    pub authorize_session_endpoint: Option<String>,
    pub authorize_session_request: serde_json::Value,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub audio_input: bool,
    pub audio_output: bool,
    #[serde(rename = "enableVAD")]
    pub enable_vad: bool,
    pub enable_amplitude_monitoring: bool,
    /// Development-only transport endpoint
    pub transport_endpoint_override: Option<String>,
}
