//! Transport layer between the session machine and the broker
//!
//! The [`Transport`] trait is the seam between the session state machine and
//! the MQTT client that owns the socket. Implementations report the two
//! asynchronous notifications (message arrived, connection lost) through the
//! [`TransportHooks`] handed to them at connect time.

use crate::agent::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::observability::ActionLog;
use crate::session::state::{SessionState, SharedSessionState};
use rumqttc::v5::mqttbytes::QoS;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod mqtt;

/// Last-will directive attached to every connect attempt
#[derive(Debug, Clone, PartialEq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

/// Everything a transport needs to open one session
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub last_will: LastWill,
}

/// A message delivered by the broker
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }
}

/// Callbacks a transport invokes from its own execution context
#[derive(Clone)]
pub struct TransportHooks {
    state: SharedSessionState,
    dispatcher: Arc<CommandDispatcher>,
    action_log: ActionLog,
}

impl TransportHooks {
    pub fn new(
        state: SharedSessionState,
        dispatcher: Arc<CommandDispatcher>,
        action_log: ActionLog,
    ) -> Self {
        Self {
            state,
            dispatcher,
            action_log,
        }
    }

    /// A publish arrived on one of our subscriptions
    pub async fn message_arrived(&self, message: InboundMessage) -> DispatchOutcome {
        debug!(target: "mqtt_transport", topic = %message.topic, "Message arrived");
        self.dispatcher.dispatch(&message).await
    }

    /// The transport lost its connection; always drops the session to `Disconnected`
    pub fn connection_lost(&self, cause: &str) {
        let previous = self.state.mark_lost();
        warn!(cause = %cause, previous_state = ?previous, "Connection lost");
        if previous == SessionState::Connected {
            self.action_log.record("MQTT connection lost");
        }
    }
}

/// Transport trait for the broker session
///
/// Mirrors the primitives of a blocking MQTT client: connect, publish,
/// subscribe and a bounded disconnect. Implementations must not reconnect on
/// their own; recovery is driven by the session machine.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a session; returns once the broker acknowledged it or the attempt failed
    async fn connect(
        &mut self,
        options: &ConnectOptions,
        hooks: TransportHooks,
    ) -> Result<(), Self::Error>;

    /// Publish a message on the current session
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Subscribe to a topic on the current session
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Self::Error>;

    /// Close the session, waiting at most `timeout` for outstanding traffic
    async fn disconnect(&mut self, timeout: Duration) -> Result<(), Self::Error>;
}

/// Type alias for the production transport
pub type MqttTransport = mqtt::MqttClient;
