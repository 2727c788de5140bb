//! Pure connection configuration for the MQTT client
//!
//! Broker address parsing, QoS conversion and translation of
//! [`ConnectOptions`] into `rumqttc` options.

use crate::transport::ConnectOptions;
use rumqttc::v5::mqttbytes::v5::LastWill as RumqttcLastWill;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default plain MQTT port
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Connection refused by broker: {0}")]
    ConnectionRefused(String),
    #[error("No connection acknowledgement within {0:?}")]
    ConnectTimeout(Duration),
    #[error("Publishing to {topic} failed")]
    PublishFailed {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Subscribing to {topic} failed")]
    SubscriptionFailed {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Disconnect failed")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker address: {0}")]
    InvalidBrokerAddress(String),
    #[error("Invalid QoS level {0}, expected 0, 1 or 2")]
    InvalidQos(u8),
    #[error("Not connected")]
    NotConnected,
}

/// Host and port of the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

impl BrokerEndpoint {
    /// Parse a bare host (`192.168.1.10`) or an `mqtt://host[:port]` / `tcp://host[:port]` URL.
    ///
    /// A port embedded in a URL wins over `port`.
    pub fn parse(address: &str, port: u16) -> Result<Self, MqttError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(MqttError::InvalidBrokerAddress(address.to_string()));
        }

        if !address.contains("://") {
            if address.contains('/') || address.contains(' ') {
                return Err(MqttError::InvalidBrokerAddress(address.to_string()));
            }
            return Ok(Self {
                host: address.to_string(),
                port,
            });
        }

        let url =
            Url::parse(address).map_err(|_| MqttError::InvalidBrokerAddress(address.to_string()))?;
        if !matches!(url.scheme(), "mqtt" | "tcp") {
            return Err(MqttError::InvalidBrokerAddress(address.to_string()));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MqttError::InvalidBrokerAddress(address.to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(port),
        })
    }
}

impl std::fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

/// Convert a numeric QoS level into the client's QoS type (pure function)
pub fn qos_from_level(level: u8) -> Result<QoS, MqttError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(other)),
    }
}

/// Pure function to configure MQTT options for one connect attempt
pub fn configure_mqtt_options(options: &ConnectOptions) -> MqttOptions {
    let mut mqtt_options =
        MqttOptions::new(options.client_id.clone(), options.host.clone(), options.port);

    if let Some(username) = &options.username {
        let password = options.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username.clone(), password);
    }

    mqtt_options.set_keep_alive(options.keep_alive);

    let will = &options.last_will;
    mqtt_options.set_last_will(RumqttcLastWill::new(
        will.topic.clone(),
        will.payload.clone(),
        will.qos,
        will.retain,
        None,
    ));

    mqtt_options
}
