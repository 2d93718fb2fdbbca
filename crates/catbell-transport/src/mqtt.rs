//! MQTT adapter over rumqttc.
//!
//! Connect builds the client, waits for the broker's ConnAck, then hands the
//! event loop to a background driver task. The driver dispatches inbound
//! publishes to registered handlers and keeps polling after errors, so a
//! dropped connection re-handshakes on the next poll; a fresh ConnAck
//! restores the recorded subscriptions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration,
    Transport as WireTransport,
};
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::manager::ConnectionState;
use crate::{InboundMessage, MessageHandler, QosLevel, Transport};

/// Broker authentication material. Certificate and web-socket modes are
/// mutually exclusive; the CLI enforces that before this type is built.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Mutual TLS: root CA plus client certificate and private key.
    Certificate {
        root_ca: PathBuf,
        cert: PathBuf,
        key: PathBuf,
    },
    /// MQTT over secure WebSocket, root CA only.
    Websocket { root_ca: PathBuf },
}

/// Transport-level tuning passed through to rumqttc. These mirror the knobs
/// the broker SDKs expose (keep-alive, handshake and operation timeouts,
/// request queueing, reconnect pacing); they are configuration, not manager
/// logic.
#[derive(Debug, Clone, Copy)]
pub struct MqttSettings {
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub queue_capacity: usize,
    pub reconnect_pause: Duration,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(5),
            queue_capacity: 16,
            reconnect_pause: Duration::from_secs(1),
        }
    }
}

type HandlerTable = Arc<Mutex<Vec<(String, MessageHandler)>>>;
type SubscriptionTable = Arc<Mutex<Vec<(String, QosLevel)>>>;

pub struct MqttTransport {
    endpoint: String,
    port: u16,
    client_id: String,
    credentials: Credentials,
    settings: MqttSettings,
    handlers: HandlerTable,
    subscriptions: SubscriptionTable,
    client: Option<AsyncClient>,
    driver: Option<JoinHandle<()>>,
}

impl MqttTransport {
    pub fn new(
        endpoint: impl Into<String>,
        port: u16,
        client_id: impl Into<String>,
        credentials: Credentials,
        settings: MqttSettings,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            port,
            client_id: client_id.into(),
            credentials,
            settings,
            handlers: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            client: None,
            driver: None,
        }
    }

    fn build_options(&self) -> Result<MqttOptions, TransportError> {
        let mut options = match &self.credentials {
            Credentials::Certificate { root_ca, cert, key } => {
                let ca = read_pem(root_ca)?;
                let client_cert = read_pem(cert)?;
                let client_key = read_pem(key)?;
                let mut options =
                    MqttOptions::new(self.client_id.clone(), self.endpoint.clone(), self.port);
                options.set_transport(WireTransport::Tls(TlsConfiguration::Simple {
                    ca,
                    alpn: None,
                    client_auth: Some((client_cert, client_key)),
                }));
                options
            }
            Credentials::Websocket { root_ca } => {
                let ca = read_pem(root_ca)?;
                let url = format!("wss://{}:{}/mqtt", self.endpoint, self.port);
                let mut options = MqttOptions::new(self.client_id.clone(), url, self.port);
                options.set_transport(WireTransport::Wss(TlsConfiguration::Simple {
                    ca,
                    alpn: None,
                    client_auth: None,
                }));
                options
            }
        };
        options.set_keep_alive(self.settings.keep_alive);
        Ok(options)
    }

    fn require_client(&self) -> Result<&AsyncClient, TransportError> {
        self.client.as_ref().ok_or(TransportError::NotConnected {
            state: ConnectionState::Disconnected,
        })
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.client.is_some() {
            return Ok(());
        }

        let options = self.build_options()?;
        let (client, mut eventloop) = AsyncClient::new(options, self.settings.queue_capacity);

        // Wait for the broker's ConnAck before declaring the attempt done.
        let handshake = tokio::time::timeout(self.settings.connect_timeout, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(TransportError::Connect(e.to_string())),
                }
            }
        });
        match handshake.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TransportError::HandshakeTimeout(
                    self.settings.connect_timeout,
                ))
            }
        }
        tracing::info!("Connected to {}:{}", self.endpoint, self.port);

        let driver = tokio::spawn(drive(
            eventloop,
            client.clone(),
            Arc::clone(&self.handlers),
            Arc::clone(&self.subscriptions),
            self.settings.reconnect_pause,
        ));
        self.client = Some(client);
        self.driver = Some(driver);
        Ok(())
    }

    async fn subscribe(
        &mut self,
        topic: &str,
        qos: QosLevel,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        let client = self.require_client()?.clone();
        self.handlers.lock().push((topic.to_string(), handler));
        self.subscriptions.lock().push((topic.to_string(), qos));

        tokio::time::timeout(
            self.settings.operation_timeout,
            client.subscribe(topic, to_qos(qos)),
        )
        .await
        .map_err(|_| TransportError::OperationTimeout {
            operation: "subscribe",
            timeout: self.settings.operation_timeout,
        })?
        .map_err(|e| TransportError::Subscribe(e.to_string()))
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
    ) -> Result<(), TransportError> {
        let client = self.require_client()?.clone();

        tokio::time::timeout(
            self.settings.operation_timeout,
            client.publish(topic, to_qos(qos), false, payload.to_vec()),
        )
        .await
        .map_err(|_| TransportError::OperationTimeout {
            operation: "publish",
            timeout: self.settings.operation_timeout,
        })?
        .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(client) = self.client.take() {
            let _ = tokio::time::timeout(self.settings.operation_timeout, client.disconnect()).await;
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
            let _ = driver.await;
        }
        tracing::info!("Disconnected from {}", self.endpoint);
        Ok(())
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// Background event pump. Outlives individual broker sessions: poll errors
/// pause briefly and resume, letting rumqttc re-handshake on the next poll.
async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    handlers: HandlerTable,
    subscriptions: SubscriptionTable,
    reconnect_pause: Duration,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let handlers = handlers.lock();
                for (topic, handler) in handlers.iter() {
                    if *topic == publish.topic {
                        handler(InboundMessage {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        });
                    }
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                // Fresh session after a drop: restore subscriptions.
                let subs: Vec<(String, QosLevel)> = subscriptions.lock().clone();
                for (topic, qos) in subs {
                    if let Err(e) = client.subscribe(&topic, to_qos(qos)).await {
                        tracing::warn!("Re-subscribe to {} failed: {}", topic, e);
                    } else {
                        tracing::info!("Re-subscribed to {}", topic);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("MQTT connection error: {}; retrying", e);
                tokio::time::sleep(reconnect_pause).await;
            }
        }
    }
}

fn read_pem(path: &PathBuf) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path)
        .map_err(|e| TransportError::Credentials(format!("{}: {}", path.display(), e)))
}

fn to_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}
