//! Audio input device records
//!
//! A device id of `None` always means "system default". Platform sentinels
//! such as `""` or `"default"` are collapsed to `None` by
//! [`normalize_device_id`] before they are stored anywhere.

use serde::{Deserialize, Serialize};

/// Identifier the platform uses for its default input route
pub const DEFAULT_DEVICE_SENTINEL: &str = "default";

/// An enumerated audio input device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Platform device identifier
    pub device_id: String,
    /// Human readable label (empty until microphone permission is granted)
    #[serde(default)]
    pub label: String,
    /// Whether the platform flags this device as its default input
    #[serde(default)]
    pub is_default: bool,
}

impl DeviceRecord {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            is_default: false,
        }
    }

    /// Mark the device as the platform default
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Normalized identifier (`None` for the system default)
    pub fn normalized_id(&self) -> Option<String> {
        normalize_device_id(Some(&self.device_id))
    }
}

/// Collapse empty and sentinel identifiers to `None`
pub fn normalize_device_id(id: Option<&str>) -> Option<String> {
    let id = id?.trim();
    if id.is_empty() || id.eq_ignore_ascii_case(DEFAULT_DEVICE_SENTINEL) {
        None
    } else {
        Some(id.to_string())
    }
}

/// Device the registry falls back to when the user has not chosen one
///
/// A device flagged as default is the system default route, so it resolves
/// to `None`. Without a flagged device the first enumerated one wins.
pub fn default_device_id(devices: &[DeviceRecord]) -> Option<String> {
    if devices.iter().any(|d| d.is_default) {
        return None;
    }
    devices.first().and_then(DeviceRecord::normalized_id)
}

/// Whether `id` (already normalized) is present in `devices`
pub fn contains_device(devices: &[DeviceRecord], id: &str) -> bool {
    devices
        .iter()
        .any(|d| d.normalized_id().as_deref() == Some(id))
}
