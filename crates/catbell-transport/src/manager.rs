use std::time::Duration;

use crate::error::TransportError;
use crate::{MessageHandler, QosLevel, Transport};

/// Lifecycle of the broker connection, owned exclusively by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: the startup retry budget is exhausted.
    Failed,
}

/// Bounded startup retry: `max_attempts` handshakes with a fixed pause
/// between failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Owns the transport handle and its [`ConnectionState`].
///
/// `connect` runs the bounded-retry state machine; `subscribe` and `publish`
/// are valid only from `Connected` and fail with `NotConnected` otherwise.
/// `Failed` is terminal and the caller must treat it as fatal.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    state: ConnectionState,
    policy: RetryPolicy,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, new_state: ConnectionState) -> Result<(), TransportError> {
        use ConnectionState::*;

        // Validate state transitions
        let valid = matches!(
            (self.state, new_state),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Disconnected, Failed)
                | (Connected, Disconnected)
        );

        if !valid {
            return Err(TransportError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }

        tracing::info!("Connection state: {:?} -> {:?}", self.state, new_state);
        self.state = new_state;
        Ok(())
    }

    /// Attempts the broker handshake up to the retry budget, sleeping the
    /// fixed backoff between failed attempts. Exhaustion is terminal.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        for attempt in 1..=self.policy.max_attempts {
            self.transition(ConnectionState::Connecting)?;
            match self.transport.connect().await {
                Ok(()) => {
                    self.transition(ConnectionState::Connected)?;
                    tracing::info!("Connection successful on attempt {}", attempt);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        "Connection attempt {}/{} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        e
                    );
                    self.transition(ConnectionState::Disconnected)?;
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        self.transition(ConnectionState::Failed)?;
        Err(TransportError::RetriesExhausted {
            attempts: self.policy.max_attempts,
        })
    }

    pub async fn subscribe(
        &mut self,
        topic: &str,
        qos: QosLevel,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected { state: self.state });
        }
        self.transport.subscribe(topic, qos, handler).await
    }

    pub async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QosLevel,
    ) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected { state: self.state });
        }
        self.transport.publish(topic, payload, qos).await
    }

    pub async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Ok(());
        }
        self.transport.disconnect().await?;
        self.transition(ConnectionState::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Fails the first `failures` handshakes, then succeeds.
    struct ScriptedTransport {
        failures: u32,
        connect_attempts: u32,
    }

    impl ScriptedTransport {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                connect_attempts: 0,
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            self.connect_attempts += 1;
            if self.connect_attempts <= self.failures {
                Err(TransportError::Connect("scripted failure".to_string()))
            } else {
                Ok(())
            }
        }

        async fn subscribe(
            &mut self,
            _topic: &str,
            _qos: QosLevel,
            _handler: MessageHandler,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn publish(
            &mut self,
            _topic: &str,
            _payload: &[u8],
            _qos: QosLevel,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fifth_attempt_after_four_failures() {
        let mut manager = ConnectionManager::new(ScriptedTransport::failing(4), policy());
        let start = tokio::time::Instant::now();

        manager.connect().await.unwrap();

        assert_eq!(manager.state(), ConnectionState::Connected);
        // 4 failures, each followed by one backoff sleep.
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_after_five_attempts() {
        let mut manager = ConnectionManager::new(ScriptedTransport::failing(u32::MAX), policy());
        let start = tokio::time::Instant::now();

        let err = manager.connect().await.unwrap_err();

        assert!(matches!(
            err,
            TransportError::RetriesExhausted { attempts: 5 }
        ));
        assert_eq!(manager.state(), ConnectionState::Failed);
        // Backoff between attempts only, never after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn immediate_success_makes_one_attempt() {
        let mut manager = ConnectionManager::new(ScriptedTransport::failing(0), policy());
        manager.connect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn publish_before_connect_is_rejected() {
        let mut manager = ConnectionManager::new(ScriptedTransport::failing(0), policy());
        let err = manager
            .publish("t", b"payload", QosLevel::AtLeastOnce)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::NotConnected {
                state: ConnectionState::Disconnected,
            }
        ));
    }

    #[tokio::test]
    async fn subscribe_from_failed_is_rejected() {
        let mut manager = ConnectionManager::new(
            ScriptedTransport::failing(u32::MAX),
            RetryPolicy {
                max_attempts: 1,
                backoff: Duration::from_millis(1),
            },
        );
        manager.connect().await.unwrap_err();

        let err = manager
            .subscribe("t", QosLevel::AtLeastOnce, Box::new(|_| {}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::NotConnected {
                state: ConnectionState::Failed,
            }
        ));
    }

    #[tokio::test]
    async fn disconnect_when_not_connected_is_a_no_op() {
        let mut manager = ConnectionManager::new(ScriptedTransport::failing(0), policy());
        manager.disconnect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
