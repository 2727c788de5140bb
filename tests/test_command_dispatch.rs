//! Command dispatch through the transport hooks
//!
//! Messages are injected the way the MQTT event loop delivers them: through
//! the hooks handed to the transport at connect time.


use pc_control::agent::DispatchOutcome;
use pc_control::protocol::Command;
use pc_control::session::StepOutcome;
use pc_control::testing::RecordingActions;
use pc_control::transport::InboundMessage;
use std::sync::Arc;
use test_helpers::{rig, rig_with_actions};
use tokio_test::assert_ok;

#[tokio::test(start_paused = true)]
async fn test_sleep_message_suspends_once() {
    let mut rig = rig();
    assert_eq!(rig.machine.step().await, StepOutcome::Connected);

    let outcome = rig
        .broker
        .deliver(InboundMessage::new("pc-control/office-pc/sleep", "now"))
        .await;

    assert_eq!(outcome, Some(DispatchOutcome::Executed(Command::Sleep)));
    assert_eq!(rig.actions.suspend_count(), 1);
    assert_eq!(rig.actions.display_off_count(), 0);

    let command_lines: Vec<_> = rig
        .log
        .entries()
        .into_iter()
        .filter(|line| line.contains("command received"))
        .collect();
    assert_eq!(command_lines.len(), 1);
    assert!(command_lines[0].ends_with("SLEEP command received - entering sleep mode"));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_off_message() {
    let mut rig = rig();
    rig.machine.step().await;

    let outcome = rig
        .broker
        .deliver(InboundMessage::new("pc-control/office-pc/monitor-off", ""))
        .await;

    assert_eq!(outcome, Some(DispatchOutcome::Executed(Command::MonitorOff)));
    assert_eq!(rig.actions.display_off_count(), 1);
    assert!(rig
        .log
        .entries()
        .iter()
        .any(|line| line.ends_with("MONITOR_OFF command received - turning off monitor")));
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_topic_does_nothing() {
    let mut rig = rig();
    rig.machine.step().await;
    let lines_before = rig.log.entries().len();

    for topic in [
        "pc-control/office-pc/sleep/",
        "PC-CONTROL/office-pc/sleep",
        "pc-control/other-pc/sleep",
        "pc-control/office-pc/version",
    ] {
        let outcome = rig.broker.deliver(InboundMessage::new(topic, "")).await;
        assert_eq!(outcome, Some(DispatchOutcome::Ignored), "topic {topic}");
    }

    assert_eq!(rig.actions.suspend_count(), 0);
    assert_eq!(rig.actions.display_off_count(), 0);
    assert_eq!(rig.log.entries().len(), lines_before);
}

#[tokio::test(start_paused = true)]
async fn test_failing_action_keeps_session_up() {
    let mut rig = rig_with_actions(Arc::new(RecordingActions::failing()));
    rig.machine.step().await;

    for _ in 0..2 {
        rig.broker
            .deliver(InboundMessage::new("pc-control/office-pc/sleep", ""))
            .await;
    }

    assert_eq!(rig.actions.suspend_count(), 2);
    assert!(rig.state.is_connected());
    assert!(rig.broker.is_connected().await);
}

#[tokio::test]
async fn test_system_actions_report_unsupported_without_commands() {
    use pc_control::actions::{ActionError, ActionHandler, SystemActions};

    let actions = SystemActions::with_invocations(None, None);
    let err = actions.suspend_machine().await.unwrap_err();
    assert!(matches!(err, ActionError::Unsupported(_)));

    // A recording handler always succeeds
    assert_ok!(RecordingActions::new().turn_off_display().await);
}
