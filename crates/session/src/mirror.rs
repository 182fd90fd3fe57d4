//! Consumer-facing session state
//!
//! The mirror republishes client and device events as one stable
//! [`SessionSnapshot`] on a `tokio::sync::watch` channel. Each event first
//! updates the snapshot and only then reaches the caller's
//! [`SessionObserver`], so an observer always sees consistent state.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use voice_client_core::{ClientEvent, DeviceRecord, SessionStatus};

use crate::preference::DeviceSelection;

/// Snapshot of everything a UI needs to render the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub user_audio_amplitude: f32,
    pub agent_audio_amplitude: f32,
    pub user_speaking: bool,
    pub agent_speaking: bool,
    pub is_muted: bool,
    pub conversation_id: Option<String>,
    pub audio_input: bool,
    pub audio_output: bool,
    pub available_input_devices: Vec<DeviceRecord>,
    pub active_input_device_id: Option<String>,
    pub preferred_input_device_id: Option<String>,
    pub is_input_device_list_loading: bool,
    pub input_device_list_error: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::default(),
            user_audio_amplitude: 0.0,
            agent_audio_amplitude: 0.0,
            user_speaking: false,
            agent_speaking: false,
            is_muted: false,
            conversation_id: None,
            audio_input: true,
            audio_output: true,
            available_input_devices: Vec::new(),
            active_input_device_id: None,
            preferred_input_device_id: None,
            is_input_device_list_loading: false,
            input_device_list_error: None,
        }
    }
}

/// Caller-supplied callbacks, invoked after the snapshot is updated
///
/// All methods default to no-ops. Callbacks run synchronously on the
/// thread that delivered the event and may call back into the controller.
pub trait SessionObserver: Send + Sync + 'static {
    fn on_connect(&self, _conversation_id: Option<&str>, _agent_config: Option<&serde_json::Value>) {}
    fn on_disconnect(&self, _reason: Option<&str>) {}
    fn on_error(&self, _message: &str) {}
    fn on_status_change(&self, _status: SessionStatus) {}
    fn on_user_amplitude(&self, _amplitude: f32) {}
    fn on_agent_amplitude(&self, _amplitude: f32) {}
    fn on_user_speaking(&self, _speaking: bool) {}
    fn on_agent_speaking(&self, _speaking: bool) {}
    fn on_mute_change(&self, _muted: bool) {}
    fn on_device_switched(&self, _device_id: Option<&str>) {}
    fn on_devices_changed(&self, _devices: &[DeviceRecord]) {}
    fn on_data_message(&self, _data: &serde_json::Value) {}
    fn on_message(&self, _message: &serde_json::Value) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Owns the published snapshot and the caller's observer
pub struct StateMirror {
    tx: watch::Sender<SessionSnapshot>,
    observer: Arc<dyn SessionObserver>,
}

impl StateMirror {
    pub fn new(initial: SessionSnapshot, observer: Arc<dyn SessionObserver>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx, observer }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        self.tx.send_modify(f);
    }

    /// Neutralize per-handle telemetry before a new handle goes live
    pub fn reset_for_new_handle(&self, conversation_id: Option<String>) {
        self.update(|s| {
            s.user_speaking = false;
            s.agent_speaking = false;
            s.user_audio_amplitude = 0.0;
            s.agent_audio_amplitude = 0.0;
            s.conversation_id = conversation_id;
        });
    }

    pub fn set_conversation_id(&self, id: Option<String>) {
        self.update(|s| s.conversation_id = id);
    }

    pub fn set_audio_input(&self, enabled: bool) {
        self.update(|s| s.audio_input = enabled);
    }

    pub fn set_audio_output(&self, enabled: bool) {
        self.update(|s| s.audio_output = enabled);
    }

    pub fn set_device_selection(&self, selection: DeviceSelection) {
        self.update(|s| {
            s.preferred_input_device_id = selection.preferred_input_device_id;
            s.active_input_device_id = selection.active_input_device_id;
        });
    }

    pub fn set_device_list(&self, devices: Vec<DeviceRecord>, selection: DeviceSelection) {
        self.update(|s| {
            s.available_input_devices = devices;
            s.input_device_list_error = None;
            s.preferred_input_device_id = selection.preferred_input_device_id;
            s.active_input_device_id = selection.active_input_device_id;
        });
    }

    pub fn set_device_list_loading(&self, loading: bool) {
        self.update(|s| s.is_input_device_list_loading = loading);
    }

    pub fn set_device_list_error(&self, error: Option<String>) {
        self.update(|s| s.input_device_list_error = error);
    }

    /// Apply a telemetry event to its snapshot field
    ///
    /// Events that carry no snapshot state (connect, disconnect, error,
    /// messages) and device events owned by the registry/resolver are
    /// left untouched here.
    pub fn apply_telemetry(&self, event: &ClientEvent) {
        match event {
            ClientEvent::StatusChange(status) => self.update(|s| s.status = *status),
            ClientEvent::UserAmplitude(level) => {
                let level = clamp_amplitude(*level);
                self.update(|s| s.user_audio_amplitude = level);
            }
            ClientEvent::AgentAmplitude(level) => {
                let level = clamp_amplitude(*level);
                self.update(|s| s.agent_audio_amplitude = level);
            }
            ClientEvent::UserSpeaking(speaking) => self.update(|s| s.user_speaking = *speaking),
            ClientEvent::AgentSpeaking(speaking) => self.update(|s| s.agent_speaking = *speaking),
            ClientEvent::MuteChange(muted) => self.update(|s| s.is_muted = *muted),
            _ => {}
        }
    }

    /// Forward an event to the observer
    pub fn notify(&self, event: &ClientEvent) {
        let observer = &self.observer;
        match event {
            ClientEvent::Connect {
                conversation_id,
                agent_config,
            } => observer.on_connect(conversation_id.as_deref(), agent_config.as_ref()),
            ClientEvent::Disconnect { reason } => observer.on_disconnect(reason.as_deref()),
            ClientEvent::Error { message } => observer.on_error(message),
            ClientEvent::StatusChange(status) => observer.on_status_change(*status),
            ClientEvent::UserAmplitude(level) => observer.on_user_amplitude(clamp_amplitude(*level)),
            ClientEvent::AgentAmplitude(level) => {
                observer.on_agent_amplitude(clamp_amplitude(*level))
            }
            ClientEvent::UserSpeaking(speaking) => observer.on_user_speaking(*speaking),
            ClientEvent::AgentSpeaking(speaking) => observer.on_agent_speaking(*speaking),
            ClientEvent::MuteChange(muted) => observer.on_mute_change(*muted),
            ClientEvent::DeviceSwitched { device_id } => {
                observer.on_device_switched(device_id.as_deref())
            }
            ClientEvent::DevicesChanged(devices) => observer.on_devices_changed(devices),
            ClientEvent::DataMessage(data) => observer.on_data_message(data),
            ClientEvent::Message(message) => observer.on_message(message),
        }
    }

    /// Report a controller-level failure to the observer
    pub fn notify_error(&self, message: &str) {
        self.observer.on_error(message);
    }
}

fn clamp_amplitude(level: f32) -> f32 {
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl SessionObserver for Recorder {
        fn on_user_speaking(&self, speaking: bool) {
            self.calls.lock().push(format!("user_speaking:{}", speaking));
        }

        fn on_error(&self, message: &str) {
            self.calls.lock().push(format!("error:{}", message));
        }
    }

    fn mirror_with(observer: Arc<dyn SessionObserver>) -> StateMirror {
        StateMirror::new(SessionSnapshot::default(), observer)
    }

    #[test]
    fn test_telemetry_updates_single_field() {
        let mirror = mirror_with(Arc::new(NoopObserver));
        let before = mirror.snapshot();

        mirror.apply_telemetry(&ClientEvent::AgentSpeaking(true));
        let after = mirror.snapshot();

        assert!(after.agent_speaking);
        assert_eq!(
            SessionSnapshot {
                agent_speaking: false,
                ..after
            },
            before
        );
    }

    #[test]
    fn test_amplitude_clamped() {
        let mirror = mirror_with(Arc::new(NoopObserver));
        mirror.apply_telemetry(&ClientEvent::UserAmplitude(1.7));
        mirror.apply_telemetry(&ClientEvent::AgentAmplitude(f32::NAN));
        let snapshot = mirror.snapshot();
        assert_eq!(snapshot.user_audio_amplitude, 1.0);
        assert_eq!(snapshot.agent_audio_amplitude, 0.0);

        mirror.apply_telemetry(&ClientEvent::UserAmplitude(-0.3));
        assert_eq!(mirror.snapshot().user_audio_amplitude, 0.0);
    }

    #[test]
    fn test_reset_for_new_handle() {
        let mirror = mirror_with(Arc::new(NoopObserver));
        mirror.apply_telemetry(&ClientEvent::UserSpeaking(true));
        mirror.apply_telemetry(&ClientEvent::AgentSpeaking(true));
        mirror.apply_telemetry(&ClientEvent::UserAmplitude(0.8));
        mirror.apply_telemetry(&ClientEvent::AgentAmplitude(0.6));
        mirror.apply_telemetry(&ClientEvent::MuteChange(true));

        mirror.reset_for_new_handle(Some("conv_1".to_string()));
        let snapshot = mirror.snapshot();
        assert!(!snapshot.user_speaking);
        assert!(!snapshot.agent_speaking);
        assert_eq!(snapshot.user_audio_amplitude, 0.0);
        assert_eq!(snapshot.agent_audio_amplitude, 0.0);
        assert_eq!(snapshot.conversation_id.as_deref(), Some("conv_1"));
        // Mute is owned by the client, not reset here
        assert!(snapshot.is_muted);
    }

    #[test]
    fn test_notify_forwards_to_observer() {
        let recorder = Arc::new(Recorder::default());
        let mirror = mirror_with(recorder.clone());

        mirror.notify(&ClientEvent::UserSpeaking(true));
        mirror.notify(&ClientEvent::Error {
            message: "boom".to_string(),
        });
        mirror.notify_error("teardown failed");

        assert_eq!(
            *recorder.calls.lock(),
            vec![
                "user_speaking:true".to_string(),
                "error:boom".to_string(),
                "error:teardown failed".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let mirror = mirror_with(Arc::new(NoopObserver));
        let mut rx = mirror.subscribe();

        mirror.apply_telemetry(&ClientEvent::StatusChange(SessionStatus::Connecting));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status, SessionStatus::Connecting);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(SessionSnapshot::default()).unwrap();
        assert_eq!(json["status"], "disconnected");
        assert_eq!(json["isInputDeviceListLoading"], false);
        assert!(json["availableInputDevices"].as_array().unwrap().is_empty());
    }
}
