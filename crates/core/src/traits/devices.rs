//! Device enumeration traits

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::device::DeviceRecord;
use crate::Result;

/// Options for a single enumeration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Whether the platform may prompt for microphone permission
    pub request_permission: bool,
}

/// Platform audio input enumeration
#[async_trait]
pub trait DeviceEnumerator: Send + Sync + 'static {
    /// List the current input devices
    async fn list_input_devices(&self, options: ListOptions) -> Result<Vec<DeviceRecord>>;

    /// Stream of full device lists, one item per hot-plug change
    ///
    /// Dropping the stream unsubscribes.
    fn watch_input_devices(&self) -> BoxStream<'static, Vec<DeviceRecord>>;
}
