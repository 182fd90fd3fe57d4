//! Session controller
//!
//! Owns the single streaming client handle and sequences its lifecycle:
//!
//! ```text
//! connect():  resolve identity ─▶ take old handle ─▶ await teardown
//!             ─▶ create handle (new generation) ─▶ apply device preference
//!             ─▶ await connect ─▶ background device refresh
//! ```
//!
//! The handle slot carries a monotonically increasing [`Generation`].
//! Every event sink is minted for one generation and events from any other
//! generation are dropped, so a superseded handle can never touch the
//! snapshot. Locks are never held across an `.await`.

use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use uuid::Uuid;

use voice_client_config::{SessionSettings, Settings};
use voice_client_core::{
    ClientConfig, ClientEvent, ClientEventSink, ClientFactory, DeviceEnumerator, DeviceRecord,
    Generation, Result, StreamingClient,
};

use crate::identity::ConversationIdentity;
use crate::mirror::{NoopObserver, SessionObserver, SessionSnapshot, StateMirror};
use crate::preference::{DevicePreference, PreferenceResolver};
use crate::registry::DeviceRegistry;

#[derive(Default)]
struct HandleSlot {
    generation: Generation,
    client: Option<Arc<dyn StreamingClient>>,
    /// Generation reserved by a connect whose handle is not installed yet
    pending: Option<Generation>,
}

impl HandleSlot {
    fn is_live(&self, generation: Generation) -> bool {
        self.generation == generation && self.client.is_some()
    }

    fn live(&self) -> Option<(Generation, Arc<dyn StreamingClient>)> {
        self.client
            .as_ref()
            .map(|client| (self.generation, Arc::clone(client)))
    }
}

struct Inner {
    id: Uuid,
    factory: Arc<dyn ClientFactory>,
    session: RwLock<SessionSettings>,
    enumerate_on_start: bool,
    identity: Mutex<ConversationIdentity>,
    slot: Mutex<HandleSlot>,
    mirror: Arc<StateMirror>,
    preference: Arc<PreferenceResolver>,
    registry: Arc<DeviceRegistry>,
}

/// Builder for [`SessionController`]
pub struct SessionControllerBuilder {
    settings: Settings,
    factory: Arc<dyn ClientFactory>,
    enumerator: Arc<dyn DeviceEnumerator>,
    observer: Arc<dyn SessionObserver>,
}

impl SessionControllerBuilder {
    /// Callbacks invoked after each snapshot update
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> SessionController {
        let session = self.settings.session;
        let preference = Arc::new(PreferenceResolver::with_initial(
            self.settings.devices.preferred_input_device_id.as_deref(),
        ));
        let identity = ConversationIdentity::new(session.conversation_id.clone());
        let selection = preference.selection();

        let initial = SessionSnapshot {
            audio_input: session.audio_input,
            audio_output: session.audio_output,
            conversation_id: identity.explicit().map(str::to_string),
            preferred_input_device_id: selection.preferred_input_device_id,
            ..SessionSnapshot::default()
        };
        let mirror = Arc::new(StateMirror::new(initial, self.observer));
        let registry = Arc::new(DeviceRegistry::new(
            self.enumerator,
            Arc::clone(&preference),
            Arc::clone(&mirror),
        ));

        let id = Uuid::new_v4();
        tracing::debug!(session = %id, agent_id = %session.agent_id, "Session controller created");

        SessionController {
            inner: Arc::new(Inner {
                id,
                factory: self.factory,
                session: RwLock::new(session),
                enumerate_on_start: self.settings.devices.enumerate_on_start,
                identity: Mutex::new(identity),
                slot: Mutex::new(HandleSlot::default()),
                mirror,
                preference,
                registry,
            }),
        }
    }
}

/// Client-side controller for one voice agent session at a time
///
/// Cheap to clone; all clones drive the same session. Dropping the last
/// clone stops device monitoring and disconnects any live handle in the
/// background.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn builder(
        settings: Settings,
        factory: Arc<dyn ClientFactory>,
        enumerator: Arc<dyn DeviceEnumerator>,
    ) -> SessionControllerBuilder {
        SessionControllerBuilder {
            settings,
            factory,
            enumerator,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn new(
        settings: Settings,
        factory: Arc<dyn ClientFactory>,
        enumerator: Arc<dyn DeviceEnumerator>,
    ) -> Self {
        Self::builder(settings, factory, enumerator).build()
    }

    /// Current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.mirror.snapshot()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.mirror.subscribe()
    }

    /// Whether a client handle is currently installed
    pub fn is_session_active(&self) -> bool {
        self.inner.slot.lock().client.is_some()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.snapshot().conversation_id
    }

    /// Pin the conversation identity used by the next `connect()`
    pub fn set_conversation_id(&self, conversation_id: Option<String>) {
        self.inner.identity.lock().set_explicit(conversation_id);
    }

    pub fn preference(&self) -> DevicePreference {
        self.inner.preference.preference()
    }

    /// Replace any existing handle with a new one and connect it
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        let conversation_id = inner.identity.lock().resolve_for_connect();

        // Supersede the old handle and neutralize telemetry before anything
        // from the new one can arrive.
        let (generation, previous) = {
            let mut slot = inner.slot.lock();
            slot.generation = slot.generation.next();
            slot.pending = Some(slot.generation);
            inner.mirror.reset_for_new_handle(conversation_id.clone());
            (slot.generation, slot.client.take())
        };

        tracing::info!(
            session = %inner.id,
            generation = %generation,
            conversation_id = ?conversation_id,
            "Connecting voice session"
        );

        if let Some(previous) = previous {
            tracing::debug!(session = %inner.id, "Tearing down previous session handle");
            if let Err(e) = previous.disconnect().await {
                tracing::warn!(session = %inner.id, error = %e, "Previous session handle failed to disconnect");
                inner.mirror.notify_error(&e.to_string());
            }
        }

        if inner.slot.lock().pending != Some(generation) {
            tracing::info!(
                session = %inner.id,
                generation = %generation,
                "Connect superseded before the session handle was created"
            );
            return Ok(());
        }

        let config = inner.client_config(conversation_id);
        let client = match inner
            .factory
            .create(config, Self::event_sink(&self.inner, generation))
        {
            Ok(client) => client,
            Err(e) => {
                {
                    let mut slot = inner.slot.lock();
                    if slot.pending == Some(generation) {
                        slot.pending = None;
                    }
                }
                tracing::error!(session = %inner.id, error = %e, "Failed to create streaming client");
                inner.mirror.notify_error(&e.to_string());
                return Err(e);
            }
        };

        let installed = {
            let mut slot = inner.slot.lock();
            if slot.pending == Some(generation) {
                debug_assert!(slot.client.is_none());
                slot.pending = None;
                slot.client = Some(Arc::clone(&client));
                true
            } else {
                false
            }
        };
        if !installed {
            tracing::info!(
                session = %inner.id,
                generation = %generation,
                "Connect superseded before the session handle went live"
            );
            if let Err(e) = client.disconnect().await {
                tracing::debug!(error = %e, "Ignoring disconnect failure of unused handle");
            }
            return Ok(());
        }

        inner.apply_preference(generation, client.as_ref()).await;

        if !inner.slot.lock().is_live(generation) {
            tracing::info!(
                session = %inner.id,
                generation = %generation,
                "Session handle cleared before connect was issued"
            );
            return Ok(());
        }

        let result = client.connect().await;

        if !inner.slot.lock().is_live(generation) {
            tracing::debug!(
                session = %inner.id,
                generation = %generation,
                ok = result.is_ok(),
                "Connect finished for a superseded session handle"
            );
            return Ok(());
        }

        if let Err(e) = result {
            tracing::warn!(session = %inner.id, error = %e, "Voice session connect failed");
            inner.mirror.notify_error(&e.to_string());
            return Err(e);
        }

        tracing::info!(session = %inner.id, generation = %generation, "Voice session connected");

        // Device labels only become available once permission is granted
        if inner.session.read().audio_input {
            inner.spawn_refresh();
        }

        Ok(())
    }

    /// Disconnect the live handle, if any
    pub async fn disconnect(&self) -> Result<()> {
        let inner = &self.inner;
        let client = {
            let mut slot = inner.slot.lock();
            if slot.client.is_none() && slot.pending == Some(slot.generation) {
                slot.generation = slot.generation.next();
                slot.pending = None;
                tracing::info!(session = %inner.id, "Cancelled connect in flight");
            }
            slot.client.take()
        };

        let Some(client) = client else {
            tracing::debug!(session = %inner.id, "disconnect() called without an active session");
            return Ok(());
        };

        if let Err(e) = client.disconnect().await {
            tracing::warn!(session = %inner.id, error = %e, "Voice session disconnect failed");
            inner.mirror.notify_error(&e.to_string());
            return Err(e);
        }

        tracing::info!(session = %inner.id, "Voice session disconnected");
        Ok(())
    }

    /// Stop device monitoring and release the live handle
    ///
    /// Failures are swallowed; this is unconditional cleanup.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.registry.stop_watching();
        let client = {
            let mut slot = inner.slot.lock();
            slot.pending = None;
            slot.client.take()
        };
        if let Some(client) = client {
            if let Err(e) = client.disconnect().await {
                tracing::debug!(session = %inner.id, error = %e, "Ignoring disconnect failure during shutdown");
            }
        }
    }

    pub fn mute(&self) {
        if let Some(client) = self.inner.client_for("mute") {
            client.mute();
        }
    }

    pub fn unmute(&self) {
        if let Some(client) = self.inner.client_for("unmute") {
            client.unmute();
        }
    }

    /// Enable or disable microphone capture
    ///
    /// Enabling is the user's opt-in that unlocks device enumeration.
    pub async fn set_audio_input(&self, enabled: bool) -> Result<()> {
        let inner = &self.inner;
        inner.session.write().audio_input = enabled;
        inner.mirror.set_audio_input(enabled);

        if enabled {
            inner.begin_device_monitoring();
        }

        let Some((_, client)) = inner.live() else {
            return Ok(());
        };
        if let Err(e) = client.set_audio_input(enabled).await {
            tracing::warn!(session = %inner.id, error = %e, enabled, "Failed to toggle audio input");
            inner.mirror.notify_error(&e.to_string());
            return Err(e);
        }
        Ok(())
    }

    pub async fn set_audio_output(&self, enabled: bool) -> Result<()> {
        let inner = &self.inner;
        inner.session.write().audio_output = enabled;
        inner.mirror.set_audio_output(enabled);

        let Some((_, client)) = inner.live() else {
            return Ok(());
        };
        if let Err(e) = client.set_audio_output(enabled).await {
            tracing::warn!(session = %inner.id, error = %e, enabled, "Failed to toggle audio output");
            inner.mirror.notify_error(&e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Record the user's input device choice and route the live handle to it
    ///
    /// The preference is published before the switch is attempted. A failed
    /// switch is recorded as the device-list error and returned.
    pub async fn select_input_device(&self, device_id: Option<&str>) -> Result<()> {
        let inner = &self.inner;
        let normalized = inner.preference.select(device_id);
        inner.registry.clear_error();
        inner.mirror.set_device_selection(inner.preference.selection());

        let Some((generation, client)) = inner.live() else {
            tracing::debug!(device_id = ?normalized, "No active session; preference applies on next connect");
            return Ok(());
        };

        match client.set_preferred_input_device(normalized.as_deref()).await {
            Ok(()) => {
                if inner.slot.lock().is_live(generation) {
                    let selection = inner.preference.set_active(normalized);
                    inner.mirror.set_device_selection(selection);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    session = %inner.id,
                    error = %e,
                    device_id = ?normalized,
                    "Failed to switch input device"
                );
                if inner.slot.lock().is_live(generation) {
                    inner.registry.set_error(Some(e.to_string()));
                }
                Err(e)
            }
        }
    }

    /// Re-enumerate input devices now
    pub async fn refresh_input_devices(&self) -> Result<Vec<DeviceRecord>> {
        self.inner.registry.refresh().await
    }

    /// Start hot-plug watching and an initial refresh if enumeration is
    /// allowed at startup
    ///
    /// Returns `false` when enumeration is deferred until audio input is
    /// enabled.
    pub fn start_device_monitoring(&self) -> bool {
        if !self.inner.enumerate_on_start {
            tracing::debug!("Device enumeration deferred until audio input is enabled");
            return false;
        }
        self.inner.begin_device_monitoring();
        true
    }

    pub fn stop_device_monitoring(&self) {
        self.inner.registry.stop_watching();
    }

    pub fn is_monitoring_devices(&self) -> bool {
        self.inner.registry.is_watching()
    }

    pub fn trigger_user_turn_started(&self) {
        if let Some(client) = self.inner.client_for("trigger_user_turn_started") {
            client.trigger_user_turn_started();
        }
    }

    pub fn trigger_user_turn_finished(&self) {
        if let Some(client) = self.inner.client_for("trigger_user_turn_finished") {
            client.trigger_user_turn_finished();
        }
    }

    pub fn send_client_response_text(&self, text: &str) {
        if let Some(client) = self.inner.client_for("send_client_response_text") {
            client.send_client_response_text(text);
        }
    }

    pub fn send_client_response_data(&self, data: serde_json::Value) {
        if let Some(client) = self.inner.client_for("send_client_response_data") {
            client.send_client_response_data(data);
        }
    }

    fn event_sink(inner: &Arc<Inner>, generation: Generation) -> ClientEventSink {
        let weak: Weak<Inner> = Arc::downgrade(inner);
        ClientEventSink::new(generation, move |generation, event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(generation, event);
            }
        })
    }
}

impl Inner {
    fn live(&self) -> Option<(Generation, Arc<dyn StreamingClient>)> {
        self.slot.lock().live()
    }

    fn client_for(&self, operation: &'static str) -> Option<Arc<dyn StreamingClient>> {
        let client = self.live().map(|(_, client)| client);
        if client.is_none() {
            tracing::warn!(session = %self.id, operation, "No active session; ignoring");
        }
        client
    }

    fn client_config(&self, conversation_id: Option<String>) -> ClientConfig {
        let session = self.session.read();
        ClientConfig {
            agent_id: session.agent_id.clone(),
            conversation_id,
            authorize_session_endpoint: session.authorize_session_endpoint.clone(),
            authorize_session_request: session.authorize_session_request.clone(),
            metadata: session.metadata.clone(),
            audio_input: session.audio_input,
            audio_output: session.audio_output,
            enable_vad: session.enable_vad,
            enable_amplitude_monitoring: session.enable_amplitude_monitoring,
            transport_endpoint_override: session.transport_endpoint_override.clone(),
        }
    }

    /// Route a freshly created handle to the resolved input device
    ///
    /// An explicit system-default choice is applied too; only an unset
    /// preference with nothing to fall back on skips the switch.
    async fn apply_preference(&self, generation: Generation, client: &dyn StreamingClient) {
        let Some(device_id) = self.preference.resolve(self.registry.default_device_id()) else {
            return;
        };

        match client.set_preferred_input_device(device_id.as_deref()).await {
            Ok(()) => {
                if self.slot.lock().is_live(generation) {
                    let selection = self.preference.set_active(device_id);
                    self.mirror.set_device_selection(selection);
                }
            }
            Err(e) => {
                tracing::warn!(
                    session = %self.id,
                    error = %e,
                    device_id = ?device_id,
                    "Failed to apply input device preference; connecting with current device"
                );
                if self.slot.lock().is_live(generation) {
                    self.registry.set_error(Some(e.to_string()));
                }
            }
        }
    }

    fn handle_event(&self, generation: Generation, event: ClientEvent) {
        {
            let slot = self.slot.lock();
            if slot.generation != generation {
                tracing::debug!(
                    session = %self.id,
                    event = event.kind(),
                    generation = %generation,
                    current = %slot.generation,
                    "Dropping event from superseded session handle"
                );
                return;
            }

            match &event {
                ClientEvent::Connect {
                    conversation_id, ..
                } => {
                    let adopted = self
                        .identity
                        .lock()
                        .adopt_server_id(conversation_id.as_deref());
                    if let Some(id) = adopted {
                        tracing::info!(session = %self.id, conversation_id = %id, "Adopted server conversation id");
                        self.mirror.set_conversation_id(Some(id));
                    }
                }
                ClientEvent::DeviceSwitched { device_id } => {
                    let selection = self.preference.on_device_switched(device_id.as_deref());
                    self.mirror.set_device_selection(selection);
                }
                ClientEvent::DevicesChanged(devices) => {
                    self.registry.apply_devices(devices.clone());
                }
                other => self.mirror.apply_telemetry(other),
            }
        }

        self.mirror.notify(&event);
    }

    fn begin_device_monitoring(&self) {
        self.registry.start_watching();
        self.spawn_refresh();
    }

    fn spawn_refresh(&self) {
        let registry = Arc::clone(&self.registry);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = registry.refresh().await {
                        tracing::debug!(error = %e, "Background device refresh failed");
                    }
                });
            }
            Err(_) => tracing::warn!("No tokio runtime; skipping background device refresh"),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.registry.stop_watching();

        let Some(client) = self.slot.get_mut().client.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let session = self.id;
                runtime.spawn(async move {
                    if let Err(e) = client.disconnect().await {
                        tracing::debug!(session = %session, error = %e, "Ignoring disconnect failure on release");
                    }
                });
            }
            Err(_) => tracing::warn!(
                session = %self.id,
                "Controller dropped outside a tokio runtime; handle released without disconnect"
            ),
        }
    }
}
