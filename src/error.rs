//! Top-level error type for agent startup
//!
//! Only startup can fail the process. Once the session machine runs, network
//! and action failures are logged and retried, never returned.

use crate::config::ConfigError;
use crate::protocol::IdentityError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Main error type for pc-control startup
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Broker settings error: {0}")]
    Broker(#[from] MqttError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: AgentError = ConfigError::MissingBroker.into();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(err.to_string().contains("No broker configured"));

        let err: AgentError = IdentityError::HostnameUnavailable.into();
        assert!(err.to_string().contains("hostname"));
        assert_eq!(err.exit_code(), 1);

        let err: AgentError = MqttError::InvalidQos(5).into();
        assert!(matches!(err, AgentError::Broker(MqttError::InvalidQos(5))));
    }
}
