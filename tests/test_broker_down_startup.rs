//! Integration Tests for Agent Startup When Broker is Down
//!
//! The agent must keep retrying with backoff, never exit, and stop promptly
//! once the run flag is cleared. Uses the real `rumqttc` transport against a
//! port nothing listens on.

use pc_control::actions::ActionHandler;
use pc_control::agent::{AgentContext, AgentLifecycle, CommandDispatcher};
use pc_control::config::AgentConfig;
use pc_control::observability::ActionLog;
use pc_control::session::{
    RunFlag, SessionMachine, SessionState, ShutdownReport, SharedSessionState, StepOutcome,
};
use pc_control::testing::RecordingActions;
use pc_control::transport::mqtt::MqttClient;
use pc_control::transport::TransportHooks;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn unreachable_broker_context() -> AgentContext {
    let mut config = AgentConfig::default();
    config.broker.host = "127.0.0.1".to_string();
    // Privileged port, never a broker in test environments
    config.broker.port = 1;
    config.broker.connect_timeout_secs = 2;
    config.device.name = Some("startup-test".to_string());
    config.reconnect.base_delay_ms = 50;
    config.reconnect.max_delay_ms = 100;
    config.logging.action_log = None;
    AgentContext::from_config(&config, || unreachable!()).unwrap()
}

#[tokio::test]
async fn test_agent_retries_when_broker_unavailable_at_startup() {
    let context = Arc::new(unreachable_broker_context());
    let state = SharedSessionState::new();
    let log = ActionLog::in_memory();
    let actions: Arc<dyn ActionHandler> = Arc::new(RecordingActions::new());
    let dispatcher =
        CommandDispatcher::new(context.topics.clone(), actions, state.clone(), log.clone());
    let hooks = TransportHooks::new(state.clone(), Arc::new(dispatcher), log.clone());

    let mut machine = SessionMachine::new(
        context,
        MqttClient::new(),
        hooks,
        state.clone(),
        RunFlag::new(),
        log.clone(),
    );

    let mut delays = Vec::new();
    for _ in 0..3 {
        match machine.step().await {
            StepOutcome::RetryScheduled(delay) => delays.push(delay.as_millis() as u64),
            other => panic!("expected a retry while the broker is down, got {other:?}"),
        }
        assert_eq!(state.get(), SessionState::Disconnected);
    }

    assert_eq!(delays, vec![50, 100, 100]);
    assert!(!machine.transport().has_session());
    assert!(log.entries().is_empty(), "no connect or loss lines without a session");
}

#[tokio::test]
async fn test_agent_stops_promptly_while_broker_down() {
    let context = unreachable_broker_context();
    let mut agent = AgentLifecycle::new(
        context,
        MqttClient::new(),
        Arc::new(RecordingActions::new()),
        ActionLog::disabled(),
    );
    let run_flag = agent.run_flag();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        run_flag.stop();
    });

    let start = Instant::now();
    let report = tokio::time::timeout(Duration::from_secs(5), agent.run())
        .await
        .expect("agent must stop once the run flag is cleared");

    assert_eq!(report, ShutdownReport::default());
    assert_eq!(agent.state(), SessionState::Disconnected);
    assert!(start.elapsed() < Duration::from_secs(5));
}
