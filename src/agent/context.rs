//! Immutable runtime context computed once at startup
//!
//! Everything the session machine, dispatcher and shutdown sequencer need to
//! know about the device and the broker. Passed explicitly; nothing here is
//! global.

use crate::config::AgentConfig;
use crate::error::AgentResult;
use crate::observability::ActionLog;
use crate::protocol::{
    DeviceIdentity, IdentityError, TopicSet, AGENT_VERSION, CLIENT_ID_PREFIX, STATUS_OFFLINE,
};
use crate::session::backoff::ReconnectConfig;
use crate::transport::mqtt::{qos_from_level, BrokerEndpoint};
use crate::transport::{ConnectOptions, LastWill};
use rumqttc::v5::mqttbytes::QoS;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentContext {
    pub identity: DeviceIdentity,
    pub topics: TopicSet,
    pub client_id: String,
    pub endpoint: BrokerEndpoint,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: QoS,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub version: &'static str,
    pub reconnect: ReconnectConfig,
    pub ignore_retained_commands: bool,
    pub action_log_path: Option<PathBuf>,
}

impl AgentContext {
    /// Resolve identity and broker settings from a validated configuration.
    ///
    /// `hostname` is only called when no device name is configured.
    pub fn from_config<F>(config: &AgentConfig, hostname: F) -> AgentResult<Self>
    where
        F: FnOnce() -> Result<String, IdentityError>,
    {
        let identity = DeviceIdentity::resolve(config.device.name.as_deref(), hostname)?;
        let topics = TopicSet::new(&config.device.topic_prefix, &identity);
        let endpoint = BrokerEndpoint::parse(&config.broker.host, config.broker.port)?;
        let qos = qos_from_level(config.broker.qos)?;

        Ok(Self {
            client_id: format!("{CLIENT_ID_PREFIX}{}", identity.normalized_id()),
            identity,
            topics,
            endpoint,
            username: config.broker.username.clone(),
            password: config.broker.password.clone(),
            qos,
            keep_alive: Duration::from_secs(config.broker.keep_alive_secs),
            connect_timeout: Duration::from_secs(config.broker.connect_timeout_secs),
            version: AGENT_VERSION,
            reconnect: config.reconnect.clone(),
            ignore_retained_commands: config.device.ignore_retained_commands,
            action_log_path: config.logging.action_log.clone(),
        })
    }

    /// Options for one connect attempt, including the retained "offline" will
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.endpoint.host.clone(),
            port: self.endpoint.port,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            keep_alive: self.keep_alive,
            connect_timeout: self.connect_timeout,
            last_will: LastWill {
                topic: self.topics.status().to_string(),
                payload: STATUS_OFFLINE.to_string(),
                qos: self.qos,
                retain: true,
            },
        }
    }

    pub fn action_log(&self) -> ActionLog {
        match &self.action_log_path {
            Some(path) => ActionLog::file(path.clone()),
            None => ActionLog::disabled(),
        }
    }
}
