//! Audio input device registry
//!
//! Enumerates input devices and keeps the device list, loading flag and
//! error string current. Explicit refreshes and hot-plug deliveries both
//! funnel through [`DeviceRegistry::apply_devices`], so the two paths can
//! never produce diverging views.

use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use voice_client_core::{default_device_id, DeviceEnumerator, DeviceRecord, ListOptions, Result};

use crate::mirror::StateMirror;
use crate::preference::PreferenceResolver;

#[derive(Debug, Default)]
struct DeviceListState {
    devices: Vec<DeviceRecord>,
    in_flight: usize,
    error: Option<String>,
}

/// Device list owner
pub struct DeviceRegistry {
    enumerator: Arc<dyn DeviceEnumerator>,
    preference: Arc<PreferenceResolver>,
    mirror: Arc<StateMirror>,
    state: Mutex<DeviceListState>,
    watch: Mutex<Option<CancellationToken>>,
}

impl DeviceRegistry {
    pub fn new(
        enumerator: Arc<dyn DeviceEnumerator>,
        preference: Arc<PreferenceResolver>,
        mirror: Arc<StateMirror>,
    ) -> Self {
        Self {
            enumerator,
            preference,
            mirror,
            state: Mutex::new(DeviceListState::default()),
            watch: Mutex::new(None),
        }
    }

    /// Last successfully enumerated list
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.state.lock().devices.clone()
    }

    /// Registry fallback device for the current list
    pub fn default_device_id(&self) -> Option<String> {
        default_device_id(&self.state.lock().devices)
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight > 0
    }

    /// Enumerate devices without prompting for permission
    ///
    /// On failure the previous list is kept and the error is recorded.
    pub async fn refresh(&self) -> Result<Vec<DeviceRecord>> {
        {
            let mut state = self.state.lock();
            state.in_flight += 1;
            self.mirror.set_device_list_loading(true);
        }

        let result = self
            .enumerator
            .list_input_devices(ListOptions {
                request_permission: false,
            })
            .await;

        let finished = {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0
        };

        match result {
            Ok(devices) => {
                tracing::debug!(count = devices.len(), "Input devices enumerated");
                self.apply_devices(devices.clone());
                if finished {
                    self.mirror.set_device_list_loading(false);
                }
                Ok(devices)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate input devices");
                self.set_error(Some(e.to_string()));
                if finished {
                    self.mirror.set_device_list_loading(false);
                }
                Err(e)
            }
        }
    }

    /// Replace the device list and re-run default selection
    pub fn apply_devices(&self, devices: Vec<DeviceRecord>) {
        let mut state = self.state.lock();
        state.devices = devices.clone();
        state.error = None;
        let selection = self.preference.reconcile(&devices);
        self.mirror.set_device_list(devices, selection);
    }

    pub fn set_error(&self, error: Option<String>) {
        let mut state = self.state.lock();
        state.error = error.clone();
        self.mirror.set_device_list_error(error);
    }

    pub fn clear_error(&self) {
        self.set_error(None);
    }

    pub fn is_watching(&self) -> bool {
        self.watch
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Subscribe to hot-plug notifications
    ///
    /// Idempotent: returns `false` if a watch is already running or no
    /// tokio runtime is available.
    pub fn start_watching(self: &Arc<Self>) -> bool {
        let mut watch = self.watch.lock();
        if watch.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No tokio runtime; device watch not started");
                return false;
            }
        };

        let token = CancellationToken::new();
        let mut stream = self.enumerator.watch_input_devices();
        let registry: Weak<Self> = Arc::downgrade(self);
        let cancel = token.clone();

        runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = stream.next() => {
                        let Some(devices) = next else {
                            tracing::debug!("Device watch stream ended");
                            break;
                        };
                        let Some(registry) = registry.upgrade() else {
                            break;
                        };
                        tracing::debug!(count = devices.len(), "Input device list changed");
                        registry.apply_devices(devices);
                    }
                }
            }
        });

        *watch = Some(token);
        tracing::debug!("Device watch started");
        true
    }

    /// Cancel the hot-plug subscription, if any
    pub fn stop_watching(&self) {
        if let Some(token) = self.watch.lock().take() {
            token.cancel();
            tracing::debug!("Device watch stopped");
        }
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        if let Some(token) = self.watch.get_mut().take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::{NoopObserver, SessionSnapshot};
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use voice_client_core::Error;

    struct FixedEnumerator {
        result: Mutex<Result<Vec<DeviceRecord>>>,
    }

    #[async_trait]
    impl DeviceEnumerator for FixedEnumerator {
        async fn list_input_devices(&self, options: ListOptions) -> Result<Vec<DeviceRecord>> {
            assert!(!options.request_permission);
            self.result.lock().clone()
        }

        fn watch_input_devices(&self) -> BoxStream<'static, Vec<DeviceRecord>> {
            futures::stream::pending().boxed()
        }
    }

    fn registry(
        result: Result<Vec<DeviceRecord>>,
    ) -> (Arc<DeviceRegistry>, Arc<StateMirror>, Arc<FixedEnumerator>) {
        let mirror = Arc::new(StateMirror::new(
            SessionSnapshot::default(),
            Arc::new(NoopObserver),
        ));
        let enumerator = Arc::new(FixedEnumerator {
            result: Mutex::new(result),
        });
        let registry = Arc::new(DeviceRegistry::new(
            enumerator.clone(),
            Arc::new(PreferenceResolver::new()),
            mirror.clone(),
        ));
        (registry, mirror, enumerator)
    }

    #[tokio::test]
    async fn test_refresh_publishes_list() {
        let devices = vec![DeviceRecord::new("B", "USB"), DeviceRecord::new("C", "Headset")];
        let (registry, mirror, _) = registry(Ok(devices.clone()));

        let listed = registry.refresh().await.unwrap();
        assert_eq!(listed, devices);

        let snapshot = mirror.snapshot();
        assert_eq!(snapshot.available_input_devices, devices);
        assert_eq!(snapshot.active_input_device_id.as_deref(), Some("B"));
        assert!(!snapshot.is_input_device_list_loading);
        assert!(!registry.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_list() {
        let (registry, mirror, enumerator) = registry(Ok(vec![DeviceRecord::new("B", "USB")]));
        registry.refresh().await.unwrap();

        *enumerator.result.lock() = Err(Error::DeviceEnumeration("permission denied".to_string()));

        let err = registry.refresh().await.unwrap_err();
        assert!(matches!(err, Error::DeviceEnumeration(_)));

        let snapshot = mirror.snapshot();
        assert_eq!(snapshot.available_input_devices.len(), 1);
        assert_eq!(snapshot.active_input_device_id.as_deref(), Some("B"));
        assert!(snapshot
            .input_device_list_error
            .as_deref()
            .unwrap()
            .contains("permission denied"));
        assert!(!snapshot.is_input_device_list_loading);
    }

    #[test]
    fn test_watch_requires_runtime() {
        let (registry, _, _) = registry(Ok(Vec::new()));
        assert!(!registry.start_watching());
        assert!(!registry.is_watching());
    }

    #[tokio::test]
    async fn test_watch_is_idempotent_and_cancellable() {
        let (registry, _, _) = registry(Ok(Vec::new()));
        assert!(registry.start_watching());
        assert!(!registry.start_watching());
        assert!(registry.is_watching());

        registry.stop_watching();
        assert!(!registry.is_watching());
        assert!(registry.start_watching());
    }
}
