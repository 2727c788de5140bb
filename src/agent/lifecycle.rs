//! Agent lifecycle management
//!
//! Wires context, transport, dispatcher and actions together with dependency
//! injection, runs the session loop until the run flag drops and then runs
//! the shutdown sequence exactly once.

use crate::actions::ActionHandler;
use crate::agent::context::AgentContext;
use crate::agent::dispatcher::CommandDispatcher;
use crate::observability::ActionLog;
use crate::session::machine::SessionMachine;
use crate::session::shutdown::{ShutdownReport, ShutdownSequencer};
use crate::session::state::{RunFlag, SessionState, SharedSessionState};
use crate::transport::{Transport, TransportHooks};
use std::sync::Arc;
use tracing::info;

pub struct AgentLifecycle<T>
where
    T: Transport + 'static,
{
    context: Arc<AgentContext>,
    machine: SessionMachine<T>,
    state: SharedSessionState,
    run_flag: RunFlag,
    action_log: ActionLog,
}

impl<T> AgentLifecycle<T>
where
    T: Transport + 'static,
{
    /// Create a new agent lifecycle manager with injected dependencies
    pub fn new(
        context: AgentContext,
        transport: T,
        actions: Arc<dyn ActionHandler>,
        action_log: ActionLog,
    ) -> Self {
        let context = Arc::new(context);
        let state = SharedSessionState::new();
        let run_flag = RunFlag::new();

        let dispatcher = CommandDispatcher::new(
            context.topics.clone(),
            actions,
            state.clone(),
            action_log.clone(),
        )
        .with_ignore_retained(context.ignore_retained_commands);
        let hooks = TransportHooks::new(state.clone(), Arc::new(dispatcher), action_log.clone());

        let machine = SessionMachine::new(
            context.clone(),
            transport,
            hooks,
            state.clone(),
            run_flag.clone(),
            action_log.clone(),
        );

        Self {
            context,
            machine,
            state,
            run_flag,
            action_log,
        }
    }

    /// Handle for the signal listener
    pub fn run_flag(&self) -> RunFlag {
        self.run_flag.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Run until the run flag is cleared, then shut down
    pub async fn run(&mut self) -> ShutdownReport {
        info!(
            device = %self.context.identity.normalized_id(),
            hostname = %self.context.identity.raw_hostname(),
            broker = %self.context.endpoint,
            version = self.context.version,
            "Starting pc-control agent"
        );

        self.machine.run().await;

        ShutdownSequencer::new(&self.context, self.state.clone(), self.action_log.clone())
            .run(self.machine.transport_mut())
            .await
    }
}
