use thiserror::Error;

use crate::manager::ConnectionState;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to read credential material: {0}")]
    Credentials(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Broker handshake did not complete within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("Operation requires a connected transport, current state: {state:?}")]
    NotConnected { state: ConnectionState },

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("{operation} did not complete within {timeout:?}")]
    OperationTimeout {
        operation: &'static str,
        timeout: std::time::Duration,
    },

    #[error("Connection retries exceeded after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}
