//! pc-control - remote sleep and display-off agent
//!
//! Connects one host to an MQTT broker, keeps a retained presence
//! (`online` / `offline`, backed by a last will) and version on the broker,
//! and executes local suspend and display power-off when messages arrive on
//! the device's command topics.
//!
//! # Topics
//!
//! For a device id `office-pc` and the default prefix:
//!
//! | Topic                            | Direction | Retained |
//! |----------------------------------|-----------|----------|
//! | `pc-control/office-pc/status`    | out       | yes      |
//! | `pc-control/office-pc/version`   | out       | yes      |
//! | `pc-control/office-pc/sleep`     | in        | -        |
//! | `pc-control/office-pc/monitor-off` | in      | -        |
//!
//! # Quick Start
//!
//! ```rust
//! use pc_control::protocol::{DeviceIdentity, TopicSet, Command};
//!
//! let identity = DeviceIdentity::from_raw("Office PC").unwrap();
//! let topics = TopicSet::new("pc-control", &identity);
//!
//! assert_eq!(topics.status(), "pc-control/office-pc/status");
//! assert_eq!(topics.command_for("pc-control/office-pc/sleep"), Some(Command::Sleep));
//! ```

pub mod actions;
pub mod agent;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod testing;
pub mod transport;

pub use agent::{AgentContext, AgentLifecycle};
pub use config::{AgentConfig, ConfigError, ConfigOverrides};
pub use error::{AgentError, AgentResult};
pub use protocol::*;
pub use transport::mqtt::MqttClient;
