//! Configuration for the pc-control agent
//!
//! Settings come from an optional TOML file and are overridden by the
//! positional command-line arguments. Every field has a default except the
//! broker host, which must be provided by one of the two.

use crate::protocol::DEFAULT_TOPIC_PREFIX;
use crate::session::backoff::ReconnectConfig;
use crate::transport::mqtt::DEFAULT_MQTT_PORT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main agent configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker host name, IP address or `mqtt://host[:port]` URL
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Upper bound for one connect attempt in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// QoS level for the will, retained publishes and subscriptions
    #[serde(default = "default_qos")]
    pub qos: u8,
}

fn default_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_keep_alive_secs() -> u64 {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_qos() -> u8 {
    1
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            qos: default_qos(),
        }
    }
}

/// Device identity and topic settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Explicit device name; the OS host name is used when absent
    pub name: Option<String>,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Drop command messages that arrive with the retain flag set
    #[serde(default)]
    pub ignore_retained_commands: bool,
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            name: None,
            topic_prefix: default_topic_prefix(),
            ignore_retained_commands: false,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// Append-only action log; omit to disable
    pub action_log: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            action_log: Some(PathBuf::from("pc-control.log")),
        }
    }
}

/// Values supplied on the command line, applied over the file configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub broker: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub device_name: Option<String>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    TomlRender(#[from] toml::ser::Error),
    #[error("No broker configured; pass it as the first argument or set broker.host")]
    MissingBroker,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line values; anything given there wins
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(broker) = overrides.broker {
            self.broker.host = broker;
        }
        if let Some(username) = overrides.username {
            self.broker.username = Some(username);
        }
        if let Some(password) = overrides.password {
            self.broker.password = Some(password);
        }
        if let Some(port) = overrides.port {
            self.broker.port = port;
        }
        if let Some(name) = overrides.device_name {
            self.device.name = Some(name);
        }
    }

    /// Check static invariants before any network activity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::MissingBroker);
        }
        if self.broker.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.port must be greater than 0".to_string(),
            ));
        }
        if self.broker.qos > 2 {
            return Err(ConfigError::InvalidConfig(format!(
                "broker.qos must be 0, 1 or 2, got {}",
                self.broker.qos
            )));
        }
        if self.broker.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.keep_alive_secs must be greater than 0".to_string(),
            ));
        }
        if self.broker.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        let prefix = &self.device.topic_prefix;
        if prefix.is_empty() || prefix.contains(['+', '#']) || prefix.ends_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "device.topic_prefix '{prefix}' must be non-empty, wildcard-free and not end with '/'"
            )));
        }

        self.reconnect.validate()
    }

    /// Render as TOML with the password masked
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.broker.password.is_some() {
            shown.broker.password = Some("***".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = AgentConfig::from_toml_str("").unwrap();
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.keep_alive_secs, 20);
        assert_eq!(config.broker.connect_timeout_secs, 10);
        assert_eq!(config.broker.qos, 1);
        assert_eq!(config.device.topic_prefix, "pc-control");
        assert!(!config.device.ignore_retained_commands);
        assert_eq!(config.reconnect, ReconnectConfig::default());
        assert_eq!(
            config.logging.action_log,
            Some(PathBuf::from("pc-control.log"))
        );
    }

    #[test]
    fn test_empty_config_is_missing_broker() {
        let config = AgentConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingBroker)));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AgentConfig::from_toml_str(
            r#"
[broker]
host = "file-broker"
port = 1884
username = "file-user"
"#,
        )
        .unwrap();

        config.apply_overrides(ConfigOverrides {
            broker: Some("cli-broker".to_string()),
            username: None,
            password: Some("pw".to_string()),
            port: Some(2883),
            device_name: Some("Den PC".to_string()),
        });

        assert_eq!(config.broker.host, "cli-broker");
        assert_eq!(config.broker.username.as_deref(), Some("file-user"));
        assert_eq!(config.broker.password.as_deref(), Some("pw"));
        assert_eq!(config.broker.port, 2883);
        assert_eq!(config.device.name.as_deref(), Some("Den PC"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AgentConfig::default();
        config.broker.host = "broker".to_string();
        assert!(config.validate().is_ok());

        let mut bad_qos = config.clone();
        bad_qos.broker.qos = 3;
        assert!(matches!(
            bad_qos.validate(),
            Err(ConfigError::InvalidConfig(msg)) if msg.contains("qos")
        ));

        let mut bad_prefix = config.clone();
        bad_prefix.device.topic_prefix = "pc/#".to_string();
        assert!(bad_prefix.validate().is_err());

        let mut bad_keep_alive = config.clone();
        bad_keep_alive.broker.keep_alive_secs = 0;
        assert!(bad_keep_alive.validate().is_err());

        let mut bad_backoff = config;
        bad_backoff.reconnect.max_delay_ms = 10;
        assert!(matches!(
            bad_backoff.validate(),
            Err(ConfigError::InvalidConfig(msg)) if msg.starts_with("reconnect.max_delay_ms")
        ));
    }

    #[test]
    fn test_redacted_toml_hides_password() {
        let mut config = AgentConfig::default();
        config.broker.host = "broker".to_string();
        config.broker.password = Some("hunter2".to_string());

        let rendered = config.to_redacted_toml().unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
        assert!(rendered.contains("[broker]"));
    }
}
