//! Voice agent client session
//!
//! Drives one real-time voice streaming session at a time:
//! - [`SessionController`]: handle lifecycle, generation-tagged event routing
//! - [`DeviceRegistry`]: input device enumeration and hot-plug watching
//! - [`PreferenceResolver`]: sticky input device preference vs. active device
//! - [`StateMirror`]: the published [`SessionSnapshot`] and observer callbacks
//!
//! # Example
//!
//! ```ignore
//! let settings = voice_client_config::load_settings("production")?;
//! voice_client_session::init_tracing(&settings.observability);
//!
//! let controller = SessionController::new(settings, factory, enumerator);
//! controller.start_device_monitoring();
//! controller.connect().await?;
//!
//! let mut updates = controller.subscribe();
//! while updates.changed().await.is_ok() {
//!     render(&updates.borrow());
//! }
//! ```

pub mod controller;
pub mod identity;
pub mod logging;
pub mod mirror;
pub mod preference;
pub mod registry;

pub use controller::{SessionController, SessionControllerBuilder};
pub use identity::ConversationIdentity;
pub use logging::init_tracing;
pub use mirror::{NoopObserver, SessionObserver, SessionSnapshot, StateMirror};
pub use preference::{DevicePreference, DeviceSelection, PreferenceResolver};
pub use registry::DeviceRegistry;

pub use voice_client_core::{
    ClientConfig, ClientEvent, ClientEventSink, ClientFactory, DeviceEnumerator, DeviceRecord,
    Error, Generation, ListOptions, Result, SessionStatus, StreamingClient,
};
