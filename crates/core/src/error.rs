//! Error types shared across the client session crates

use thiserror::Error;

/// Session client errors
///
/// Nothing in this taxonomy is fatal to the process. Each variant is either
/// recovered locally (logged and reflected in state) or returned to the
/// immediate caller of the failing operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Authorization or transport failure while connecting
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failure while disconnecting a client handle
    #[error("Teardown error: {0}")]
    Teardown(String),

    /// Permission denial or platform error while listing devices
    #[error("Device enumeration error: {0}")]
    DeviceEnumeration(String),

    /// The client refused or failed to switch input device
    #[error("Device switch error: {0}")]
    DeviceSwitch(String),

    /// The client factory could not build a handle
    #[error("Client creation error: {0}")]
    ClientCreation(String),

    /// Any other failure reported by the streaming client
    #[error("Client error: {0}")]
    Client(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
