pub mod error;
pub mod manager;
pub mod mqtt;

pub use error::TransportError;
pub use manager::{ConnectionManager, ConnectionState, RetryPolicy};
pub use mqtt::{Credentials, MqttSettings, MqttTransport};

use async_trait::async_trait;

/// Message-delivery guarantee requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// One message received on a subscribed topic.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Callback invoked from the transport's driver task per inbound message.
/// Runs off the main loop; it must not touch loop state.
pub type MessageHandler = Box<dyn Fn(InboundMessage) + Send + Sync>;

/// A trait for pub/sub transports.
///
/// This defines the common interface for broker clients, allowing the
/// connection manager and the monitoring loop to run against any
/// implementation (or a test fake).
#[async_trait]
pub trait Transport: Send {
    /// One handshake attempt against the broker. Retries belong to the
    /// [`ConnectionManager`], not here.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Registers `handler` for messages arriving on `topic`.
    async fn subscribe(
        &mut self,
        topic: &str,
        qos: QosLevel,
        handler: MessageHandler,
    ) -> Result<(), TransportError>;

    /// Publishes one payload. A failure is reported to the caller; no
    /// delivery guarantee beyond the requested QoS.
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
    ) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
