//! Input device preference resolution
//!
//! Keeps the user's sticky choice apart from what the audio layer is
//! actually using:
//!
//! - `preference`: set by explicit user action (or adopted from the first
//!   device switch the client reports); survives refreshes and reconnects
//! - `active`: what the client currently captures from
//!
//! Resolution precedence when a device must be picked:
//! explicit preference > client-reported active > registry default > system default

use parking_lot::Mutex;
use serde::Serialize;

use voice_client_core::{contains_device, default_device_id, normalize_device_id, DeviceRecord};

/// The user's device choice
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// No choice recorded yet; active follows the registry default
    #[default]
    Unset,
    /// A recorded choice; `None` means "system default" on purpose
    Explicit(Option<String>),
}

impl DevicePreference {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }

    /// Preferred device id for display (`None` for unset or system default)
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::Unset => None,
            Self::Explicit(id) => id.as_deref(),
        }
    }
}

/// Published view of the preference state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSelection {
    pub preferred_input_device_id: Option<String>,
    pub active_input_device_id: Option<String>,
}

#[derive(Debug, Default)]
struct PreferenceState {
    preference: DevicePreference,
    active: Option<String>,
}

impl PreferenceState {
    fn selection(&self) -> DeviceSelection {
        DeviceSelection {
            preferred_input_device_id: self.preference.device_id().map(str::to_string),
            active_input_device_id: self.active.clone(),
        }
    }
}

/// Reconciles the sticky preference against the active device and
/// device-list changes
#[derive(Debug, Default)]
pub struct PreferenceResolver {
    state: Mutex<PreferenceState>,
}

impl PreferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a preference restored by the caller
    pub fn with_initial(preferred: Option<&str>) -> Self {
        let resolver = Self::default();
        if let Some(id) = preferred {
            resolver.state.lock().preference =
                DevicePreference::Explicit(normalize_device_id(Some(id)));
        }
        resolver
    }

    pub fn preference(&self) -> DevicePreference {
        self.state.lock().preference.clone()
    }

    pub fn active(&self) -> Option<String> {
        self.state.lock().active.clone()
    }

    pub fn selection(&self) -> DeviceSelection {
        self.state.lock().selection()
    }

    /// Record an explicit user choice; returns the normalized id
    pub fn select(&self, id: Option<&str>) -> Option<String> {
        let normalized = normalize_device_id(id);
        self.state.lock().preference = DevicePreference::Explicit(normalized.clone());
        tracing::debug!(device_id = ?normalized, "Input device preference recorded");
        normalized
    }

    /// The client confirmed it now captures from `id`
    pub fn set_active(&self, id: Option<String>) -> DeviceSelection {
        let mut state = self.state.lock();
        state.active = id;
        state.selection()
    }

    /// The client reported a device switch (explicit or forced re-route)
    ///
    /// Without a recorded preference the reported device is adopted as the
    /// preference.
    pub fn on_device_switched(&self, id: Option<&str>) -> DeviceSelection {
        let normalized = normalize_device_id(id);
        let mut state = self.state.lock();
        state.active = normalized.clone();
        if !state.preference.is_set() {
            tracing::debug!(device_id = ?normalized, "Adopting first reported device as preference");
            state.preference = DevicePreference::Explicit(normalized);
        }
        state.selection()
    }

    /// Recompute the active device for a freshly enumerated list
    ///
    /// Never mutates the preference itself.
    pub fn reconcile(&self, devices: &[DeviceRecord]) -> DeviceSelection {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if devices.is_empty() {
            state.active = None;
            return state.selection();
        }

        match &state.preference {
            DevicePreference::Unset => {
                state.active = default_device_id(devices);
            }
            DevicePreference::Explicit(Some(preferred)) if !contains_device(devices, preferred) => {
                tracing::info!(
                    device_id = %preferred,
                    "Preferred input device no longer present; falling back to default"
                );
                state.active = default_device_id(devices);
            }
            DevicePreference::Explicit(_) => {}
        }

        state.selection()
    }

    /// Device a new client handle should be routed to
    ///
    /// `None` means there is nothing to apply. `Some(None)` routes to the
    /// system default.
    pub fn resolve(&self, registry_default: Option<String>) -> Option<Option<String>> {
        let state = self.state.lock();
        match &state.preference {
            DevicePreference::Explicit(id) => Some(id.clone()),
            DevicePreference::Unset => state.active.clone().or(registry_default).map(Some),
        }
    }
}
