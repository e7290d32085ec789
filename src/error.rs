//! Crate-level error type
//!
//! Module errors stay specific ([`ConfigError`], [`IdGeneratorError`],
//! [`MqttError`]); this enum collects them for the binary and for callers that
//! only need to report a failure.

use crate::config::ConfigError;
use crate::id_generator::IdGeneratorError;
use crate::transport::MqttError;
use thiserror::Error;

/// Main error type for listener start-up and session failures
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client ID generation failed: {0}")]
    IdGeneration(#[from] IdGeneratorError),

    #[error("Transport error: {0}")]
    Transport(#[from] MqttError),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Result type for listener operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let error: ClientError = ConfigError::InvalidField {
            field: "port",
            reason: "0 is outside 1-65535".to_string(),
        }
        .into();

        assert!(matches!(error, ClientError::Config(_)));
        assert_eq!(
            error.to_string(),
            "Configuration error: port is invalid: 0 is outside 1-65535"
        );
    }

    #[test]
    fn test_id_generation_error_conversion() {
        let error: ClientError =
            IdGeneratorError::InvalidArgument("Client ID cannot be empty".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Client ID generation failed: Invalid argument: Client ID cannot be empty"
        );
    }

    #[test]
    fn test_transport_error_conversion() {
        let error: ClientError = MqttError::Transport("socket closed".to_string()).into();
        assert!(matches!(error, ClientError::Transport(_)));
        assert!(error.to_string().contains("socket closed"));
    }
}
