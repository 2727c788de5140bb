//! Topic construction and command lookup
//!
//! Every topic is `<prefix>/<device-id>/<leaf>`. Command routing is an exact
//! string comparison against the two command topics.

use super::identity::DeviceIdentity;

/// The four topics owned by one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    sleep: String,
    monitor_off: String,
    status: String,
    version: String,
}

/// Remote commands understood by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Suspend the machine
    Sleep,
    /// Power off the display
    MonitorOff,
}

impl Command {
    /// Line written to the action log when the command is executed
    pub fn log_line(self) -> &'static str {
        match self {
            Command::Sleep => "SLEEP command received - entering sleep mode",
            Command::MonitorOff => "MONITOR_OFF command received - turning off monitor",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Sleep => "sleep",
            Command::MonitorOff => "monitor-off",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TopicSet {
    pub fn new(prefix: &str, identity: &DeviceIdentity) -> Self {
        let id = identity.normalized_id();
        Self {
            sleep: format!("{prefix}/{id}/sleep"),
            monitor_off: format!("{prefix}/{id}/monitor-off"),
            status: format!("{prefix}/{id}/status"),
            version: format!("{prefix}/{id}/version"),
        }
    }

    pub fn sleep(&self) -> &str {
        &self.sleep
    }

    pub fn monitor_off(&self) -> &str {
        &self.monitor_off
    }

    /// Retained presence topic, also the last-will topic
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Retained version topic
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Command topics in subscription order
    pub fn command_topics(&self) -> [&str; 2] {
        [&self.sleep, &self.monitor_off]
    }

    /// Exact-match lookup of an inbound topic
    pub fn command_for(&self, topic: &str) -> Option<Command> {
        if topic == self.sleep {
            Some(Command::Sleep)
        } else if topic == self.monitor_off {
            Some(Command::MonitorOff)
        } else {
            None
        }
    }
}
