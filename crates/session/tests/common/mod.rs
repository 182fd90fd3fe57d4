//! Scripted doubles for the streaming client and device enumerator

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

use voice_client_config::Settings;
use voice_client_session::{
    ClientConfig, ClientEvent, ClientEventSink, ClientFactory, DeviceEnumerator, DeviceRecord,
    Error, ListOptions, Result, SessionController, SessionObserver, SessionSnapshot,
    StreamingClient,
};

/// Failure and blocking switches for a mock client
#[derive(Default, Clone)]
pub struct Behavior {
    pub fail_connect: bool,
    pub fail_disconnect: bool,
    pub fail_switch: bool,
    /// When set, `connect()` waits for a notification first
    pub connect_gate: Option<Arc<Notify>>,
    /// When set, `disconnect()` waits for a notification first
    pub disconnect_gate: Option<Arc<Notify>>,
    /// When set, `set_preferred_input_device()` waits for a notification first
    pub switch_gate: Option<Arc<Notify>>,
}

pub struct MockClient {
    pub index: usize,
    pub config: ClientConfig,
    sink: ClientEventSink,
    behavior: Mutex<Behavior>,
    calls: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn emit(&self, event: ClientEvent) {
        self.sink.emit(event);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls.lock().iter().any(|c| c == call)
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl StreamingClient for MockClient {
    async fn connect(&self) -> Result<()> {
        self.record("connect");
        let gate = self.behavior.lock().connect_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.behavior.lock().fail_connect {
            return Err(Error::Connection("authorization rejected".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect");
        let gate = self.behavior.lock().disconnect_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.behavior.lock().fail_disconnect {
            return Err(Error::Teardown("transport already closed".to_string()));
        }
        Ok(())
    }

    fn mute(&self) {
        self.record("mute");
    }

    fn unmute(&self) {
        self.record("unmute");
    }

    async fn set_audio_input(&self, enabled: bool) -> Result<()> {
        self.record(format!("audio_input:{}", enabled));
        Ok(())
    }

    async fn set_audio_output(&self, enabled: bool) -> Result<()> {
        self.record(format!("audio_output:{}", enabled));
        Ok(())
    }

    async fn set_preferred_input_device(&self, device_id: Option<&str>) -> Result<()> {
        self.record(format!("device:{}", device_id.unwrap_or("system")));
        let gate = self.behavior.lock().switch_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.behavior.lock().fail_switch {
            return Err(Error::DeviceSwitch("device busy".to_string()));
        }
        Ok(())
    }

    fn send_client_response_text(&self, text: &str) {
        self.record(format!("text:{}", text));
    }

    fn send_client_response_data(&self, data: serde_json::Value) {
        self.record(format!("data:{}", data));
    }

    fn trigger_user_turn_started(&self) {
        self.record("turn_started");
    }

    fn trigger_user_turn_finished(&self) {
        self.record("turn_finished");
    }
}

/// Factory that records every handle it creates
#[derive(Default)]
pub struct MockFactory {
    pub next_behavior: Mutex<Behavior>,
    pub fail_create: Mutex<bool>,
    clients: Mutex<Vec<Arc<MockClient>>>,
}

impl MockFactory {
    pub fn clients(&self) -> Vec<Arc<MockClient>> {
        self.clients.lock().clone()
    }

    pub fn client(&self, index: usize) -> Arc<MockClient> {
        Arc::clone(&self.clients.lock()[index])
    }

    pub fn last(&self) -> Arc<MockClient> {
        let clients = self.clients.lock();
        Arc::clone(clients.last().expect("no client created"))
    }

    pub fn created(&self) -> usize {
        self.clients.lock().len()
    }
}

impl ClientFactory for MockFactory {
    fn create(
        &self,
        config: ClientConfig,
        events: ClientEventSink,
    ) -> Result<Arc<dyn StreamingClient>> {
        if *self.fail_create.lock() {
            return Err(Error::ClientCreation("sdk not loaded".to_string()));
        }
        let mut clients = self.clients.lock();
        let client = Arc::new(MockClient {
            index: clients.len(),
            config,
            sink: events,
            behavior: Mutex::new(self.next_behavior.lock().clone()),
            calls: Mutex::new(Vec::new()),
        });
        clients.push(Arc::clone(&client));
        Ok(client)
    }
}

/// Enumerator with a settable result and a push-driven hot-plug stream
pub struct MockEnumerator {
    pub result: Mutex<Result<Vec<DeviceRecord>>>,
    list_calls: AtomicUsize,
    watchers: Mutex<Vec<mpsc::UnboundedSender<Vec<DeviceRecord>>>>,
}

impl MockEnumerator {
    pub fn new(devices: Vec<DeviceRecord>) -> Self {
        Self {
            result: Mutex::new(Ok(devices)),
            list_calls: AtomicUsize::new(0),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }

    /// Simulate a hot-plug change
    pub fn push(&self, devices: Vec<DeviceRecord>) {
        *self.result.lock() = Ok(devices.clone());
        self.watchers
            .lock()
            .retain(|tx| tx.send(devices.clone()).is_ok());
    }
}

#[async_trait]
impl DeviceEnumerator for MockEnumerator {
    async fn list_input_devices(&self, options: ListOptions) -> Result<Vec<DeviceRecord>> {
        assert!(!options.request_permission, "enumeration must never prompt");
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().clone()
    }

    fn watch_input_devices(&self) -> BoxStream<'static, Vec<DeviceRecord>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().push(tx);
        UnboundedReceiverStream::new(rx).boxed()
    }
}

/// Observer that records callbacks alongside the snapshot they observed
#[derive(Default)]
pub struct RecordingObserver {
    pub snapshots: Mutex<Option<watch::Receiver<SessionSnapshot>>>,
    pub calls: Mutex<Vec<String>>,
    pub seen_user_speaking: Mutex<Vec<(bool, bool)>>,
}

impl RecordingObserver {
    pub fn attach(&self, controller: &SessionController) {
        *self.snapshots.lock() = Some(controller.subscribe());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("error:"))
            .cloned()
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_connect(&self, conversation_id: Option<&str>, _agent_config: Option<&serde_json::Value>) {
        self.calls
            .lock()
            .push(format!("connect:{}", conversation_id.unwrap_or("-")));
    }

    fn on_disconnect(&self, reason: Option<&str>) {
        self.calls
            .lock()
            .push(format!("disconnect:{}", reason.unwrap_or("-")));
    }

    fn on_error(&self, message: &str) {
        self.calls.lock().push(format!("error:{}", message));
    }

    fn on_user_speaking(&self, speaking: bool) {
        let observed = self
            .snapshots
            .lock()
            .as_ref()
            .map(|rx| rx.borrow().user_speaking)
            .unwrap_or(!speaking);
        self.seen_user_speaking.lock().push((speaking, observed));
    }
}

pub fn settings() -> Settings {
    Settings::for_agent("agent_test")
}

pub fn device(id: &str) -> DeviceRecord {
    DeviceRecord::new(id, format!("{} microphone", id))
}

pub struct Harness {
    pub controller: SessionController,
    pub factory: Arc<MockFactory>,
    pub enumerator: Arc<MockEnumerator>,
    pub observer: Arc<RecordingObserver>,
}

pub fn harness(settings: Settings, devices: Vec<DeviceRecord>) -> Harness {
    let factory = Arc::new(MockFactory::default());
    let enumerator = Arc::new(MockEnumerator::new(devices));
    let observer = Arc::new(RecordingObserver::default());
    let controller = SessionController::builder(settings, factory.clone(), enumerator.clone())
        .observer(observer.clone())
        .build();
    observer.attach(&controller);
    Harness {
        controller,
        factory,
        enumerator,
        observer,
    }
}

/// Yield until `condition` holds
pub async fn until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached");
}

/// Wait until the published snapshot satisfies `predicate`
pub async fn wait_for_snapshot(
    controller: &SessionController,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = controller.subscribe();
    let result = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate)).await;
    match result {
        Ok(Ok(snapshot)) => snapshot.clone(),
        _ => panic!("snapshot condition not reached: {:?}", controller.snapshot()),
    }
}
