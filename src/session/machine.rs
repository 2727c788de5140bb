//! Connection lifecycle state machine
//!
//! Each [`SessionMachine::step`] either idles one tick while connected, or
//! makes one connect attempt followed by the birth sequence:
//!
//! 1. publish `status = "online"` (retained)
//! 2. publish `version` (retained)
//! 3. subscribe to `sleep`, then `monitor-off`
//!
//! Any failure tears the attempt down and waits out the current backoff delay
//! in interruptible ticks. Connection loss reported by the transport moves the
//! shared state to `Disconnected` and the next step reconnects.

use crate::agent::context::AgentContext;
use crate::observability::ActionLog;
use crate::protocol::STATUS_ONLINE;
use crate::session::backoff::Backoff;
use crate::session::state::{RunFlag, SessionState, SharedSessionState};
use crate::session_span;
use crate::transport::{Transport, TransportHooks};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

/// Granularity of every wait in the control loop
pub const TICK: Duration = Duration::from_millis(100);

/// Disconnect bound when a birth sequence is aborted
pub const BIRTH_ABORT_DISCONNECT_TIMEOUT: Duration = Duration::from_millis(100);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a connect attempt failed. Always recoverable.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connect failed: {0}")]
    Connect(#[source] BoxError),
    #[error("Publishing to {topic} failed: {source}")]
    Publish {
        topic: String,
        #[source]
        source: BoxError,
    },
    #[error("Subscribing to {topic} failed: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: BoxError,
    },
    #[error("Connection lost during birth sequence")]
    LostDuringBirth,
}

/// Result of one control-loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Run flag cleared; the loop must exit
    Stopped,
    /// Already connected; waited one tick
    Idle,
    /// Attempt succeeded and the session is live
    Connected,
    /// Attempt failed; the given delay has been waited (or cut short)
    RetryScheduled(Duration),
}

pub struct SessionMachine<T: Transport> {
    context: Arc<AgentContext>,
    transport: T,
    hooks: TransportHooks,
    state: SharedSessionState,
    run_flag: RunFlag,
    backoff: Backoff,
    action_log: ActionLog,
    attempts: u64,
}

impl<T: Transport> SessionMachine<T> {
    pub fn new(
        context: Arc<AgentContext>,
        transport: T,
        hooks: TransportHooks,
        state: SharedSessionState,
        run_flag: RunFlag,
        action_log: ActionLog,
    ) -> Self {
        let backoff = Backoff::new(&context.reconnect);
        Self {
            context,
            transport,
            hooks,
            state,
            run_flag,
            backoff,
            action_log,
            attempts: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Delay the next failed attempt will wait
    pub fn current_backoff(&self) -> Duration {
        self.backoff.current()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run until the run flag is cleared
    pub async fn run(&mut self) {
        info!(
            broker = %self.context.endpoint,
            client_id = %self.context.client_id,
            "Session loop started"
        );
        while self.step().await != StepOutcome::Stopped {}
        debug!("Session loop stopped");
    }

    /// One iteration of the control loop
    pub async fn step(&mut self) -> StepOutcome {
        if !self.run_flag.is_running() {
            return StepOutcome::Stopped;
        }

        if self.state.is_connected() {
            self.run_flag.sleep(TICK, TICK).await;
            return StepOutcome::Idle;
        }

        self.attempts += 1;
        let span = session_span!(attempt = self.attempts, broker = %self.context.endpoint);
        let result = self.attempt().instrument(span).await;

        match result {
            Ok(()) => {
                self.backoff.reset();
                info!(
                    broker = %self.context.endpoint,
                    device = %self.context.identity.normalized_id(),
                    "Connected to MQTT broker"
                );
                self.action_log.record("Connected to MQTT broker");
                StepOutcome::Connected
            }
            Err(e) => {
                let delay = self.backoff.current();
                warn!(
                    error = %e,
                    attempt = self.attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    "MQTT connection attempt failed"
                );
                self.run_flag.sleep(delay, TICK).await;
                self.backoff.advance();
                StepOutcome::RetryScheduled(delay)
            }
        }
    }

    async fn attempt(&mut self) -> Result<(), SessionError> {
        self.state.begin_attempt();
        debug!("Connecting to MQTT broker");

        let options = self.context.connect_options();
        if let Err(e) = self.transport.connect(&options, self.hooks.clone()).await {
            self.state.set(SessionState::Disconnected);
            return Err(SessionError::Connect(Box::new(e)));
        }

        if let Err(e) = self.birth().await {
            self.abort_session().await;
            return Err(e);
        }

        if !self.state.promote_to_connected() {
            self.abort_session().await;
            return Err(SessionError::LostDuringBirth);
        }

        Ok(())
    }

    async fn birth(&self) -> Result<(), SessionError> {
        let topics = &self.context.topics;
        let qos = self.context.qos;

        for (topic, payload) in [
            (topics.status(), STATUS_ONLINE),
            (topics.version(), self.context.version),
        ] {
            self.transport
                .publish(topic, payload.as_bytes(), qos, true)
                .await
                .map_err(|e| SessionError::Publish {
                    topic: topic.to_string(),
                    source: Box::new(e),
                })?;
            debug!(topic, payload, "Published retained");
        }

        for topic in topics.command_topics() {
            self.transport
                .subscribe(topic, qos)
                .await
                .map_err(|e| SessionError::Subscribe {
                    topic: topic.to_string(),
                    source: Box::new(e),
                })?;
            debug!(topic, "Subscribed");
        }

        Ok(())
    }

    /// Tear down a half-established session
    async fn abort_session(&mut self) {
        if let Err(e) = self
            .transport
            .disconnect(BIRTH_ABORT_DISCONNECT_TIMEOUT)
            .await
        {
            debug!(error = %e, "Disconnect after failed birth sequence failed");
        }
        self.state.set(SessionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::dispatcher::CommandDispatcher;
    use crate::config::AgentConfig;
    use crate::testing::mocks::{MockTransport, RecordingActions, TransportCall};

    struct Harness {
        machine: SessionMachine<MockTransport>,
        transport: MockTransport,
        state: SharedSessionState,
        run_flag: RunFlag,
        log: ActionLog,
    }

    fn harness() -> Harness {
        let mut config = AgentConfig::default();
        config.broker.host = "broker.lan".to_string();
        let context =
            Arc::new(AgentContext::from_config(&config, || Ok("desk".to_string())).unwrap());

        let state = SharedSessionState::new();
        let run_flag = RunFlag::new();
        let log = ActionLog::in_memory();
        let dispatcher = CommandDispatcher::new(
            context.topics.clone(),
            Arc::new(RecordingActions::new()),
            state.clone(),
            log.clone(),
        );
        let hooks = TransportHooks::new(state.clone(), Arc::new(dispatcher), log.clone());
        let transport = MockTransport::new();

        Harness {
            machine: SessionMachine::new(
                context,
                transport.clone(),
                hooks,
                state.clone(),
                run_flag.clone(),
                log.clone(),
            ),
            transport,
            state,
            run_flag,
            log,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_birth_order() {
        let mut h = harness();

        assert_eq!(h.machine.step().await, StepOutcome::Connected);
        assert_eq!(h.state.get(), SessionState::Connected);

        let calls = h.transport.calls().await;
        assert!(matches!(&calls[0], TransportCall::Connect { will_payload, will_retain: true, .. } if will_payload == "offline"));
        assert_eq!(
            calls[1..].to_vec(),
            vec![
                TransportCall::Publish {
                    topic: "pc-control/desk/status".to_string(),
                    payload: "online".to_string(),
                    retain: true,
                },
                TransportCall::Publish {
                    topic: "pc-control/desk/version".to_string(),
                    payload: "1.1.0".to_string(),
                    retain: true,
                },
                TransportCall::Subscribe {
                    topic: "pc-control/desk/sleep".to_string(),
                },
                TransportCall::Subscribe {
                    topic: "pc-control/desk/monitor-off".to_string(),
                },
            ]
        );
        assert!(h.log.entries()[0].ends_with("Connected to MQTT broker"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_step_idles() {
        let mut h = harness();
        h.machine.step().await;

        let start = tokio::time::Instant::now();
        assert_eq!(h.machine.step().await, StepOutcome::Idle);
        assert_eq!(start.elapsed(), TICK);
        assert_eq!(h.transport.connect_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_when_flag_cleared() {
        let mut h = harness();
        h.run_flag.stop();
        assert_eq!(h.machine.step().await, StepOutcome::Stopped);
        assert!(h.transport.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_across_failures() {
        let mut h = harness();
        h.transport.fail_next_connects(3).await;

        let mut delays = Vec::new();
        for _ in 0..3 {
            match h.machine.step().await {
                StepOutcome::RetryScheduled(delay) => delays.push(delay.as_millis() as u64),
                other => panic!("expected retry, got {other:?}"),
            }
            assert_eq!(h.state.get(), SessionState::Disconnected);
        }
        assert_eq!(delays, vec![1000, 2000, 4000]);

        assert_eq!(h.machine.step().await, StepOutcome::Connected);
        assert_eq!(h.machine.current_backoff(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_failure_tears_down() {
        let mut h = harness();
        h.transport.fail_subscribe_to("pc-control/desk/monitor-off").await;

        assert!(matches!(
            h.machine.step().await,
            StepOutcome::RetryScheduled(_)
        ));
        assert_eq!(h.state.get(), SessionState::Disconnected);
        assert!(matches!(
            h.transport.calls().await.last(),
            Some(TransportCall::Disconnect { timeout_ms: 100 })
        ));
        assert!(h.log.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_during_birth_is_a_failure() {
        let mut h = harness();
        h.transport
            .lose_connection_after("pc-control/desk/monitor-off")
            .await;

        assert!(matches!(
            h.machine.step().await,
            StepOutcome::RetryScheduled(_)
        ));
        assert_eq!(h.state.get(), SessionState::Disconnected);
        // Nothing was Connected, so no loss line either
        assert!(h.log.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_wait_cut_short_by_stop() {
        let mut h = harness();
        h.transport.fail_next_connects(1).await;
        h.machine.backoff = Backoff::new(&crate::session::backoff::ReconnectConfig {
            base_delay_ms: 30_000,
            max_delay_ms: 30_000,
        });

        let stopper = h.run_flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            stopper.stop();
        });

        let start = tokio::time::Instant::now();
        h.machine.step().await;
        assert!(start.elapsed() <= Duration::from_millis(250));
        assert_eq!(h.machine.step().await, StepOutcome::Stopped);
    }
}
