//! Routes inbound broker messages to local actions
//!
//! Invoked directly from the transport's event-loop task. Topic matching is
//! exact against the two command topics; the payload is never inspected.
//!
//! Messages are accepted while `Connecting` as well as `Connected`: a retained
//! command can arrive right after its SUBACK, before the session machine has
//! promoted the state. Only a `Disconnected` session drops them.

use crate::actions::ActionHandler;
use crate::command_span;
use crate::observability::ActionLog;
use crate::protocol::{Command, TopicSet};
use crate::session::state::{SessionState, SharedSessionState};
use crate::transport::InboundMessage;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// What the dispatcher did with one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Session disconnected; message dropped
    NotConnected,
    /// Topic is not one of the command topics
    Ignored,
    /// Retained command dropped because `ignore_retained_commands` is set
    RetainedSkipped,
    /// Command handed to the action handler
    Executed(Command),
}

pub struct CommandDispatcher {
    topics: TopicSet,
    actions: Arc<dyn ActionHandler>,
    state: SharedSessionState,
    action_log: ActionLog,
    ignore_retained: bool,
}

impl CommandDispatcher {
    pub fn new(
        topics: TopicSet,
        actions: Arc<dyn ActionHandler>,
        state: SharedSessionState,
        action_log: ActionLog,
    ) -> Self {
        Self {
            topics,
            actions,
            state,
            action_log,
            ignore_retained: false,
        }
    }

    /// Drop command messages carrying the retain flag
    pub fn with_ignore_retained(mut self, ignore: bool) -> Self {
        self.ignore_retained = ignore;
        self
    }

    /// Handle one inbound message.
    ///
    /// Action failures are logged and never reach the session.
    pub async fn dispatch(&self, message: &InboundMessage) -> DispatchOutcome {
        if self.state.get() == SessionState::Disconnected {
            debug!(topic = %message.topic, "Dropping message, session not connected");
            return DispatchOutcome::NotConnected;
        }

        let Some(command) = self.topics.command_for(&message.topic) else {
            debug!(topic = %message.topic, "Ignoring message on unknown topic");
            return DispatchOutcome::Ignored;
        };

        if message.retain && self.ignore_retained {
            info!(command = %command, topic = %message.topic, "Skipping retained command");
            return DispatchOutcome::RetainedSkipped;
        }

        self.action_log.record(command.log_line());
        info!(command = %command, "{}", command.log_line());

        self.execute(command)
            .instrument(command_span!(command = %command, topic = %message.topic))
            .await;

        DispatchOutcome::Executed(command)
    }

    async fn execute(&self, command: Command) {
        let result = match command {
            Command::Sleep => self.actions.suspend_machine().await,
            Command::MonitorOff => self.actions.turn_off_display().await,
        };

        match result {
            Ok(()) => debug!(command = %command, "Action completed"),
            Err(e) => warn!(command = %command, error = %e, "Action failed"),
        }
    }
}
