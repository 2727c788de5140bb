//! Impure I/O operations for the MQTT client
//!
//! Wraps a `rumqttc` v5 `AsyncClient`/`EventLoop` pair per session. The event
//! loop is polled inline until the ConnAck arrives, then handed to a background
//! task that forwards publishes and reports the first error as connection
//! lost. The task never polls past an error, so `rumqttc` never reconnects on
//! its own.
//!
//! `subscribe` blocks until the broker answers with the SUBACK for its packet
//! id. The event-loop task forwards subscribe packet ids and SUBACK reason
//! codes over a channel owned by the session.

use super::connection::{configure_mqtt_options, MqttError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::transport::{ConnectOptions, Transport, TransportHooks};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the client request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Subscription progress reported by the event-loop task
#[derive(Debug)]
enum SubscribeEvent {
    Sent(u16),
    Acked { packet_id: u16, rejected: Option<String> },
    SessionEnded(String),
}

/// Failure reported by the broker or the session while subscribing
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct SubAckError(String);

type SubscribeEvents = Arc<Mutex<mpsc::UnboundedReceiver<SubscribeEvent>>>;

/// MQTT transport backed by `rumqttc`
pub struct MqttClient {
    client: Option<AsyncClient>,
    event_loop_handle: Option<JoinHandle<()>>,
    closing: Arc<AtomicBool>,
    subscribe_events: Option<SubscribeEvents>,
    ack_timeout: Duration,
}

impl Default for MqttClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttClient {
    pub fn new() -> Self {
        Self {
            client: None,
            event_loop_handle: None,
            closing: Arc::new(AtomicBool::new(false)),
            subscribe_events: None,
            ack_timeout: Duration::from_secs(10),
        }
    }

    /// True while a session's event-loop task is alive
    pub fn has_session(&self) -> bool {
        self.event_loop_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn active_client(&self) -> Result<&AsyncClient, MqttError> {
        self.client.as_ref().ok_or(MqttError::NotConnected)
    }

    /// Drop whatever is left of a previous session without notifying anyone
    fn discard_session(&mut self) {
        self.closing.store(true, Ordering::Release);
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
        self.client = None;
        self.subscribe_events = None;
    }

    /// Poll the event loop until the broker acknowledges the connection
    async fn wait_for_connack(event_loop: &mut EventLoop, timeout: Duration) -> Result<(), MqttError> {
        let result = tokio::time::timeout(timeout, async {
            loop {
                let event = event_loop
                    .poll()
                    .await
                    .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;

                match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::ConnectionAcknowledged => return Ok(()),
                    EventRoute::ConnectionRefused(reason) => {
                        return Err(MqttError::ConnectionRefused(reason))
                    }
                    other => debug!(target: "mqtt_transport", "Pre-ConnAck event: {:?}", other),
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(MqttError::ConnectTimeout(timeout)),
        }
    }

    /// Background task driving one session's event loop
    async fn run_event_loop(
        mut event_loop: EventLoop,
        hooks: TransportHooks,
        closing: Arc<AtomicBool>,
        subscribe_events: mpsc::UnboundedSender<SubscribeEvent>,
    ) {
        loop {
            // Send errors only mean no subscribe is waiting
            match event_loop.poll().await {
                Ok(event) => match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::MessageReceived(message) => {
                        if closing.load(Ordering::Acquire) {
                            debug!(target: "mqtt_transport", topic = %message.topic, "Dropping message received while closing");
                            continue;
                        }
                        hooks.message_arrived(message).await;
                    }
                    EventRoute::Disconnected => {
                        let _ = subscribe_events
                            .send(SubscribeEvent::SessionEnded("broker closed the session".to_string()));
                        if !closing.load(Ordering::Acquire) {
                            hooks.connection_lost("broker closed the session");
                        }
                        break;
                    }
                    EventRoute::SubscribeSent(packet_id) => {
                        let _ = subscribe_events.send(SubscribeEvent::Sent(packet_id));
                    }
                    EventRoute::SubscriptionAcknowledged { packet_id, rejected } => {
                        debug!(target: "mqtt_transport", packet_id, ?rejected, "SubAck received");
                        let _ = subscribe_events.send(SubscribeEvent::Acked { packet_id, rejected });
                    }
                    EventRoute::InfrastructureEvent(event) => {
                        debug!(target: "mqtt_transport", "MQTT event: {}", event);
                    }
                    EventRoute::ConnectionAcknowledged
                    | EventRoute::ConnectionRefused(_)
                    | EventRoute::OutgoingEvent => {}
                },
                Err(e) => {
                    let _ = subscribe_events.send(SubscribeEvent::SessionEnded(e.to_string()));
                    if !closing.load(Ordering::Acquire) {
                        hooks.connection_lost(&e.to_string());
                    }
                    break;
                }
            }
        }
        debug!(target: "mqtt_transport", "MQTT event loop stopped");
    }

    /// Wait for the SUBACK answering the next SUBSCRIBE written to the socket
    async fn await_suback(
        events: &mut mpsc::UnboundedReceiver<SubscribeEvent>,
    ) -> Result<u16, String> {
        let mut expected = None;
        loop {
            match events.recv().await {
                Some(SubscribeEvent::Sent(packet_id)) => {
                    expected.get_or_insert(packet_id);
                }
                Some(SubscribeEvent::Acked { packet_id, rejected }) if expected == Some(packet_id) => {
                    return match rejected {
                        None => Ok(packet_id),
                        Some(reason) => Err(format!("broker rejected subscription: {reason}")),
                    };
                }
                Some(SubscribeEvent::Acked { packet_id, .. }) => {
                    debug!(target: "mqtt_transport", packet_id, "Ignoring SubAck for another request");
                }
                Some(SubscribeEvent::SessionEnded(reason)) => {
                    return Err(format!("session ended before SubAck: {reason}"))
                }
                None => return Err("event loop stopped before SubAck".to_string()),
            }
        }
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(
        &mut self,
        options: &ConnectOptions,
        hooks: TransportHooks,
    ) -> Result<(), Self::Error> {
        self.discard_session();

        let mqtt_options = configure_mqtt_options(options);
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        Self::wait_for_connack(&mut event_loop, options.connect_timeout).await?;

        let closing = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::run_event_loop(
            event_loop,
            hooks,
            closing.clone(),
            events_tx,
        ));

        self.closing = closing;
        self.client = Some(client);
        self.event_loop_handle = Some(handle);
        self.subscribe_events = Some(Arc::new(Mutex::new(events_rx)));
        self.ack_timeout = options.connect_timeout;

        info!(
            host = %options.host,
            port = options.port,
            client_id = %options.client_id,
            "MQTT session established"
        );
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        self.active_client()?
            .publish(topic, qos, retain, payload.to_vec())
            .await
            .map_err(|e| MqttError::PublishFailed {
                topic: topic.to_string(),
                source: Box::new(e),
            })?;

        debug!(target: "mqtt_transport", topic, retain, "Published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        let client = self.active_client()?;
        let events = self
            .subscribe_events
            .as_ref()
            .ok_or(MqttError::NotConnected)?;
        let failed = |reason: String| MqttError::SubscriptionFailed {
            topic: topic.to_string(),
            source: Box::new(SubAckError(reason)),
        };

        // One subscribe in flight at a time
        let mut events = events.lock().await;
        while let Ok(stale) = events.try_recv() {
            if let SubscribeEvent::SessionEnded(reason) = stale {
                return Err(failed(format!("session ended: {reason}")));
            }
        }

        client
            .subscribe(topic, qos)
            .await
            .map_err(|e| MqttError::SubscriptionFailed {
                topic: topic.to_string(),
                source: Box::new(e),
            })?;

        let packet_id = tokio::time::timeout(self.ack_timeout, Self::await_suback(&mut events))
            .await
            .map_err(|_| failed(format!("no SubAck within {:?}", self.ack_timeout)))?
            .map_err(failed)?;

        debug!(target: "mqtt_transport", topic, packet_id, "Subscribed");
        Ok(())
    }

    async fn disconnect(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        self.closing.store(true, Ordering::Release);

        let Some(client) = self.client.take() else {
            self.discard_session();
            return Ok(());
        };

        // Queued behind any pending publish, so those are flushed first
        let result = client
            .disconnect()
            .await
            .map_err(|e| MqttError::DisconnectFailed(Box::new(e)));

        if let Some(mut handle) = self.event_loop_handle.take() {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => debug!(target: "mqtt_transport", "Event loop task shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => warn!("Event loop task ended with error: {}", e),
                Ok(Err(_)) => {}
                Err(_) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "Event loop did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        info!("MQTT client disconnected");
        result
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        // No async in Drop; callers should disconnect() for a graceful close
        self.discard_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::dispatcher::CommandDispatcher;
    use crate::observability::ActionLog;
    use crate::protocol::{DeviceIdentity, TopicSet};
    use crate::session::state::SharedSessionState;
    use crate::testing::mocks::RecordingActions;
    use crate::transport::LastWill;

    fn hooks() -> TransportHooks {
        let identity = DeviceIdentity::from_raw("test-pc").unwrap();
        let state = SharedSessionState::new();
        let dispatcher = CommandDispatcher::new(
            TopicSet::new("pc-control", &identity),
            Arc::new(RecordingActions::new()),
            state.clone(),
            ActionLog::disabled(),
        );
        TransportHooks::new(state, Arc::new(dispatcher), ActionLog::disabled())
    }

    fn unreachable_options() -> ConnectOptions {
        ConnectOptions {
            host: "127.0.0.1".to_string(),
            // Port 1 is privileged and never runs a broker in test environments
            port: 1,
            client_id: "pc-control-test".to_string(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(2),
            last_will: LastWill {
                topic: "pc-control/test-pc/status".to_string(),
                payload: "offline".to_string(),
                qos: QoS::AtLeastOnce,
                retain: true,
            },
        }
    }

    #[tokio::test]
    async fn test_operations_fail_without_session() {
        let client = MqttClient::new();
        assert!(!client.has_session());
        assert!(matches!(
            client
                .publish("t", b"x", QoS::AtLeastOnce, true)
                .await,
            Err(MqttError::NotConnected)
        ));
        assert!(matches!(
            client.subscribe("t", QoS::AtLeastOnce).await,
            Err(MqttError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let mut client = MqttClient::new();
        assert!(client.disconnect(Duration::from_millis(100)).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_broker_fails() {
        let mut client = MqttClient::new();
        let result = client.connect(&unreachable_options(), hooks()).await;

        assert!(result.is_err(), "connect must fail without a broker");
        assert!(!client.has_session());
    }

    #[tokio::test]
    async fn test_suback_wait_matches_packet_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SubscribeEvent::Acked { packet_id: 1, rejected: None }).unwrap();
        tx.send(SubscribeEvent::Sent(2)).unwrap();
        tx.send(SubscribeEvent::Acked { packet_id: 3, rejected: None }).unwrap();
        tx.send(SubscribeEvent::Acked { packet_id: 2, rejected: None }).unwrap();

        assert_eq!(MqttClient::await_suback(&mut rx).await, Ok(2));
    }

    #[tokio::test]
    async fn test_suback_wait_reports_rejection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SubscribeEvent::Sent(9)).unwrap();
        tx.send(SubscribeEvent::Acked {
            packet_id: 9,
            rejected: Some("NotAuthorized".to_string()),
        })
        .unwrap();

        let err = MqttClient::await_suback(&mut rx).await.unwrap_err();
        assert!(err.contains("NotAuthorized"), "{err}");
    }

    #[tokio::test]
    async fn test_suback_wait_fails_when_session_ends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SubscribeEvent::Sent(4)).unwrap();
        tx.send(SubscribeEvent::SessionEnded("connection reset".to_string()))
            .unwrap();
        assert!(MqttClient::await_suback(&mut rx).await.is_err());

        drop(tx);
        assert!(MqttClient::await_suback(&mut rx).await.is_err());
    }
}
