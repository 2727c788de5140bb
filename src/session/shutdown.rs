//! Graceful shutdown
//!
//! The signal listener clears the [`RunFlag`]; once the control loop has
//! returned, [`ShutdownSequencer::run`] publishes the retained "offline"
//! status (only if a session is live) and closes the connection within a
//! fixed bound.

use crate::agent::context::AgentContext;
use crate::observability::ActionLog;
use crate::protocol::STATUS_OFFLINE;
use crate::session::state::{RunFlag, SessionState, SharedSessionState};
use crate::transport::Transport;
use rumqttc::v5::mqttbytes::QoS;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bound for the final "offline" publish
pub const OFFLINE_PUBLISH_TIMEOUT: Duration = Duration::from_millis(1000);

/// Bound for the final disconnect
pub const SHUTDOWN_DISCONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// What the shutdown sequence managed to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub offline_published: bool,
    pub disconnected: bool,
}

pub struct ShutdownSequencer {
    status_topic: String,
    qos: QoS,
    state: SharedSessionState,
    action_log: ActionLog,
}

impl ShutdownSequencer {
    pub fn new(context: &AgentContext, state: SharedSessionState, action_log: ActionLog) -> Self {
        Self {
            status_topic: context.topics.status().to_string(),
            qos: context.qos,
            state,
            action_log,
        }
    }

    /// Run once, after the control loop has exited
    pub async fn run<T: Transport>(&self, transport: &mut T) -> ShutdownReport {
        info!("Shutting down");
        self.action_log.record("Shutting down");

        let mut report = ShutdownReport::default();

        if self.state.get() != SessionState::Connected {
            debug!("No live session, skipping offline status");
            self.state.set(SessionState::Disconnected);
            return report;
        }

        let publish = transport.publish(
            &self.status_topic,
            STATUS_OFFLINE.as_bytes(),
            self.qos,
            true,
        );
        match tokio::time::timeout(OFFLINE_PUBLISH_TIMEOUT, publish).await {
            Ok(Ok(())) => {
                report.offline_published = true;
                debug!(topic = %self.status_topic, "Published offline status");
            }
            Ok(Err(e)) => warn!(error = %e, "Failed to publish offline status"),
            Err(_) => warn!(
                timeout_ms = OFFLINE_PUBLISH_TIMEOUT.as_millis() as u64,
                "Timed out publishing offline status"
            ),
        }

        match transport.disconnect(SHUTDOWN_DISCONNECT_TIMEOUT).await {
            Ok(()) => report.disconnected = true,
            Err(e) => warn!(error = %e, "Disconnect during shutdown failed"),
        }

        self.state.set(SessionState::Disconnected);
        info!(
            offline_published = report.offline_published,
            disconnected = report.disconnected,
            "Shutdown complete"
        );
        report
    }
}

/// Install SIGINT/SIGTERM handling that clears `run_flag` on the first signal.
///
/// Handlers are registered before this returns, so a registration failure is
/// reported to the caller instead of leaving the agent unstoppable.
#[cfg(unix)]
pub fn spawn_signal_listener(run_flag: RunFlag) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        info!(signal = name, "Received termination signal");
        run_flag.stop();
    }))
}

/// Install Ctrl-C handling that clears `run_flag`
#[cfg(not(unix))]
pub fn spawn_signal_listener(run_flag: RunFlag) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(signal = "Ctrl-C", "Received termination signal");
                run_flag.stop();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    }))
}
