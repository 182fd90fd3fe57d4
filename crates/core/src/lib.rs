//! Core traits and types for the voice agent client session
//!
//! This crate provides the types shared by the config and session crates:
//! - Collaborator traits (streaming client, client factory, device enumerator)
//! - Device records and id normalization
//! - Session status, client events and generation tags
//! - Error types

pub mod device;
pub mod error;
pub mod session;
pub mod traits;

pub use device::{
    contains_device, default_device_id, normalize_device_id, DeviceRecord,
    DEFAULT_DEVICE_SENTINEL,
};
pub use error::{Error, Result};
pub use session::{ClientConfig, ClientEvent, ClientEventSink, Generation, SessionStatus};
pub use traits::{ClientFactory, DeviceEnumerator, ListOptions, StreamingClient};
