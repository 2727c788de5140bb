//! MQTT implementation of the [`Transport`](crate::transport::Transport) trait
//!
//! # Architecture
//!
//! - [`connection`] - Pure configuration: broker address, QoS, client options
//! - [`message_handler`] - Pure routing of `rumqttc` events
//! - [`client`] - Impure I/O: the `rumqttc` client and its event-loop task
//!
//! # Usage
//!
//! ```rust,no_run
//! use pc_control::transport::mqtt::MqttClient;
//!
//! let client = MqttClient::new();
//! assert!(!client.has_session());
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

// Re-export public types for convenience
pub use client::MqttClient;
pub use connection::{qos_from_level, BrokerEndpoint, MqttError, DEFAULT_MQTT_PORT};
pub use message_handler::{EventRoute, MessageHandler};
