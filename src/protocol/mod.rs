//! Wire-level vocabulary of the pc-control agent
//!
//! Topic layout, retained payload literals and the command set shared by the
//! session machine and the dispatcher.

pub mod identity;
pub mod topics;

pub use identity::{normalize_device_name, system_hostname, DeviceIdentity, IdentityError};
pub use topics::{Command, TopicSet};

/// Version string announced on the retained `version` topic
pub const AGENT_VERSION: &str = "1.1.0";

/// Default prefix for every topic owned by this agent
pub const DEFAULT_TOPIC_PREFIX: &str = "pc-control";

/// Prefix prepended to the device id to form the MQTT client id
pub const CLIENT_ID_PREFIX: &str = "pc-control-";

/// Retained presence payload while a session is up
pub const STATUS_ONLINE: &str = "online";

/// Retained presence payload after a graceful shutdown or via the last will
pub const STATUS_OFFLINE: &str = "offline";
