//! Mock implementations for testing
//!
//! `MockTransport` records every call and can be scripted to fail connects,
//! publishes or subscribes; it also lets a test play the broker by delivering
//! messages or dropping the connection through the hooks it was handed.
//! `RecordingActions` counts action invocations instead of touching the OS.

use crate::actions::{ActionError, ActionHandler};
use crate::agent::dispatcher::DispatchOutcome;
use crate::transport::{ConnectOptions, InboundMessage, Transport, TransportHooks};
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::QoS;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// One recorded transport operation
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Connect {
        client_id: String,
        will_topic: String,
        will_payload: String,
        will_retain: bool,
    },
    Publish {
        topic: String,
        payload: String,
        retain: bool,
    },
    Subscribe {
        topic: String,
    },
    Disconnect {
        timeout_ms: u64,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("Mock transport failure: {0}")]
pub struct MockTransportError(pub String);

#[derive(Default)]
struct MockState {
    calls: Vec<TransportCall>,
    hooks: Option<TransportHooks>,
    connected: bool,
    connect_failures: usize,
    fail_subscribe: Option<String>,
    fail_publish: bool,
    lose_after: Option<String>,
}

/// Scriptable in-memory transport; clones share state
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` connect attempts
    pub async fn fail_next_connects(&self, count: usize) {
        self.state.lock().await.connect_failures = count;
    }

    /// Fail every subscribe to `topic`
    pub async fn fail_subscribe_to(&self, topic: impl Into<String>) {
        self.state.lock().await.fail_subscribe = Some(topic.into());
    }

    /// Fail (or stop failing) every publish
    pub async fn set_fail_publish(&self, fail: bool) {
        self.state.lock().await.fail_publish = fail;
    }

    /// Report the connection lost right after the next successful publish or
    /// subscribe on `topic`, as if the broker went away mid-birth
    pub async fn lose_connection_after(&self, topic: impl Into<String>) {
        self.state.lock().await.lose_after = Some(topic.into());
    }

    /// Deliver a message through the hooks of the live session
    pub async fn deliver(&self, message: InboundMessage) -> Option<DispatchOutcome> {
        let hooks = {
            let state = self.state.lock().await;
            if !state.connected {
                return None;
            }
            state.hooks.clone()
        };
        match hooks {
            Some(hooks) => Some(hooks.message_arrived(message).await),
            None => None,
        }
    }

    /// Simulate the broker dropping the session
    pub async fn drop_connection(&self, cause: &str) {
        let hooks = {
            let mut state = self.state.lock().await;
            state.connected = false;
            state.hooks.take()
        };
        if let Some(hooks) = hooks {
            hooks.connection_lost(cause);
        }
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn connect_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| matches!(call, TransportCall::Connect { .. }))
            .count()
    }

    /// `(topic, payload, retain)` of every publish, in order
    pub async fn published(&self) -> Vec<(String, String, bool)> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Publish {
                    topic,
                    payload,
                    retain,
                } => Some((topic.clone(), payload.clone(), *retain)),
                _ => None,
            })
            .collect()
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Subscribe { topic } => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    async fn maybe_lose_after(&self, topic: &str) {
        let hooks = {
            let mut state = self.state.lock().await;
            if state.lose_after.as_deref() != Some(topic) {
                return;
            }
            state.lose_after = None;
            state.connected = false;
            state.hooks.take()
        };
        if let Some(hooks) = hooks {
            hooks.connection_lost("broker went away");
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn connect(
        &mut self,
        options: &ConnectOptions,
        hooks: TransportHooks,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::Connect {
            client_id: options.client_id.clone(),
            will_topic: options.last_will.topic.clone(),
            will_payload: options.last_will.payload.clone(),
            will_retain: options.last_will.retain,
        });

        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(MockTransportError("connection refused".to_string()));
        }

        state.connected = true;
        state.hooks = Some(hooks);
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        _qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        {
            let mut state = self.state.lock().await;
            if !state.connected {
                return Err(MockTransportError("not connected".to_string()));
            }
            state.calls.push(TransportCall::Publish {
                topic: topic.to_string(),
                payload: String::from_utf8_lossy(payload).to_string(),
                retain,
            });
            if state.fail_publish {
                return Err(MockTransportError(format!("publish to {topic} failed")));
            }
        }
        self.maybe_lose_after(topic).await;
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _qos: QoS) -> Result<(), Self::Error> {
        {
            let mut state = self.state.lock().await;
            if !state.connected {
                return Err(MockTransportError("not connected".to_string()));
            }
            state.calls.push(TransportCall::Subscribe {
                topic: topic.to_string(),
            });
            if state.fail_subscribe.as_deref() == Some(topic) {
                return Err(MockTransportError(format!("subscribe to {topic} failed")));
            }
        }
        self.maybe_lose_after(topic).await;
        Ok(())
    }

    async fn disconnect(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::Disconnect {
            timeout_ms: timeout.as_millis() as u64,
        });
        state.connected = false;
        state.hooks = None;
        Ok(())
    }
}

/// Action handler that only counts invocations
#[derive(Debug, Default)]
pub struct RecordingActions {
    suspends: AtomicUsize,
    display_offs: AtomicUsize,
    fail: bool,
}

impl RecordingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts invocations but reports every action as failed
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn suspend_count(&self) -> usize {
        self.suspends.load(Ordering::SeqCst)
    }

    pub fn display_off_count(&self) -> usize {
        self.display_offs.load(Ordering::SeqCst)
    }

    fn outcome(&self, action: &str) -> Result<(), ActionError> {
        if self.fail {
            Err(ActionError::Failed(format!("{action} failed")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ActionHandler for RecordingActions {
    async fn suspend_machine(&self) -> Result<(), ActionError> {
        self.suspends.fetch_add(1, Ordering::SeqCst);
        self.outcome("suspend")
    }

    async fn turn_off_display(&self) -> Result<(), ActionError> {
        self.display_offs.fetch_add(1, Ordering::SeqCst);
        self.outcome("display off")
    }
}
