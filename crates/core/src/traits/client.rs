//! Streaming client traits

use async_trait::async_trait;
use std::sync::Arc;

use crate::session::{ClientConfig, ClientEventSink};
use crate::Result;

/// Real-time voice streaming client
///
/// Owns audio capture/playback, VAD, transport and the authorization
/// handshake. The session controller only drives its lifecycle and
/// consumes the events it reports through its [`ClientEventSink`].
///
/// # Example
///
/// ```ignore
/// let client = factory.create(config, sink)?;
/// client.set_preferred_input_device(Some("usb-mic")).await?;
/// client.connect().await?;
/// ```
#[async_trait]
pub trait StreamingClient: Send + Sync + 'static {
    /// Authorize and open the session
    async fn connect(&self) -> Result<()>;

    /// Close the session and release audio resources
    async fn disconnect(&self) -> Result<()>;

    fn mute(&self);

    fn unmute(&self);

    async fn set_audio_input(&self, enabled: bool) -> Result<()>;

    async fn set_audio_output(&self, enabled: bool) -> Result<()>;

    /// Route capture through `device_id` (`None` = system default)
    async fn set_preferred_input_device(&self, device_id: Option<&str>) -> Result<()>;

    fn send_client_response_text(&self, text: &str);

    fn send_client_response_data(&self, data: serde_json::Value);

    fn trigger_user_turn_started(&self);

    fn trigger_user_turn_finished(&self);
}

/// Builds streaming client handles
///
/// Handles are only ever created through a factory so tests can substitute
/// a scripted double.
pub trait ClientFactory: Send + Sync + 'static {
    fn create(
        &self,
        config: ClientConfig,
        events: ClientEventSink,
    ) -> Result<Arc<dyn StreamingClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(ClientConfig, ClientEventSink) -> Result<Arc<dyn StreamingClient>>
        + Send
        + Sync
        + 'static,
{
    fn create(
        &self,
        config: ClientConfig,
        events: ClientEventSink,
    ) -> Result<Arc<dyn StreamingClient>> {
        self(config, events)
    }
}
