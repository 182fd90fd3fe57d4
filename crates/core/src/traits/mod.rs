//! Collaborator traits for the client session
//!
//! Both external collaborators sit behind traits so the controller can be
//! driven by test doubles:
//!
//! ```text
//! StreamingClient:  connect / disconnect / mute / device routing / events
//! ClientFactory:    builds one StreamingClient per connect
//! DeviceEnumerator: list + hot-plug watch of audio inputs
//! ```

mod client;
mod devices;

pub use client::{ClientFactory, StreamingClient};
pub use devices::{DeviceEnumerator, ListOptions};
