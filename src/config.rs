//! Client configuration
//!
//! Configuration comes from environment variables (optionally seeded from a
//! `.env` file by the binary) or from a TOML file. Either way the result is a
//! [`ClientConfig`] holding already-resolved values; validation runs later,
//! once per connection attempt.

use crate::id_generator::{generate_client_id, IdGeneratorError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_BROKER: &str = "broker.emqx.io";
pub const DEFAULT_PORT: u32 = 1883;
pub const DEFAULT_CLIENT_ID: &str = "BMS Client";
pub const DEFAULT_TOPIC: &str = "Rubicon/BMS/Default/Raw";
pub const DEFAULT_QOS: u8 = 0;
pub const DEFAULT_CLEAN_SESSION: bool = true;
pub const DEFAULT_KEEP_ALIVE: u64 = 60;
pub const DEFAULT_RECONNECT_ON_FAILURE: bool = true;

/// Environment value meaning "not set" for optional credentials
const NONE_SENTINEL: &str = "None";

/// MQTT client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Broker host name or address
    #[serde(default = "default_broker")]
    pub broker: String,
    /// Broker port (1-65535)
    #[serde(default = "default_port")]
    pub port: u32,
    /// Identifier sent in the CONNECT handshake
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Topic filter to subscribe to
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Subscription QoS (0, 1 or 2)
    #[serde(default)]
    pub qos: u8,
    #[serde(default = "default_true")]
    pub clean_session: bool,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
    #[serde(default = "default_true")]
    pub reconnect_on_failure: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_broker() -> String {
    DEFAULT_BROKER.to_string()
}

fn default_port() -> u32 {
    DEFAULT_PORT
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_true() -> bool {
    true
}

fn default_keep_alive() -> u64 {
    DEFAULT_KEEP_ALIVE
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            port: DEFAULT_PORT,
            client_id: default_client_id(),
            topic: default_topic(),
            qos: DEFAULT_QOS,
            clean_session: DEFAULT_CLEAN_SESSION,
            keep_alive: DEFAULT_KEEP_ALIVE,
            reconnect_on_failure: DEFAULT_RECONNECT_ON_FAILURE,
            username: None,
            password: None,
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("{field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unset keys take their defaults. Integers that fail to parse fall back to
    /// the default, booleans are true only for the literal `True`, and the
    /// literal `None` clears a credential.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let flag_or = |key: &str, default: bool| lookup(key).map_or(default, |value| value == "True");
        let credential = |key: &str| lookup(key).filter(|value| value != NONE_SENTINEL);

        Self {
            broker: string_or("BROKER", DEFAULT_BROKER),
            port: parse_or(lookup("PORT"), DEFAULT_PORT),
            client_id: string_or("CLIENT_ID", DEFAULT_CLIENT_ID),
            topic: string_or("TOPIC", DEFAULT_TOPIC),
            qos: parse_or(lookup("QOS"), DEFAULT_QOS),
            clean_session: flag_or("CLEAN_SESSION", DEFAULT_CLEAN_SESSION),
            keep_alive: parse_or(lookup("KEEP_ALIVE"), DEFAULT_KEEP_ALIVE),
            reconnect_on_failure: flag_or("RECONNECT_ON_FAILURE", DEFAULT_RECONNECT_ON_FAILURE),
            username: credential("USERNAME"),
            password: credential("PASSWORD"),
        }
    }

    /// Load configuration from a TOML file; missing keys take their defaults
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Replace `client_id` (treated as a base name) with a generated identifier
    pub fn with_generated_client_id(mut self, suffix_length: usize) -> Result<Self, IdGeneratorError> {
        self.client_id = generate_client_id(&self.client_id, suffix_length)?;
        Ok(self)
    }

    /// Copy with the password masked, for display
    pub fn redacted(&self) -> Self {
        Self {
            password: self.password.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        }
    }

    /// Check every field and report the first violation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.trim().is_empty() {
            return Err(ConfigError::invalid("broker", "must not be empty"));
        }
        if !(1..=u32::from(u16::MAX)).contains(&self.port) {
            return Err(ConfigError::invalid(
                "port",
                format!("{} is outside 1-65535", self.port),
            ));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::invalid("client_id", "must not be empty"));
        }
        if !is_valid_topic_filter(&self.topic) {
            return Err(ConfigError::invalid(
                "topic",
                format!("'{}' is not a valid topic filter", self.topic),
            ));
        }
        if self.qos > 2 {
            return Err(ConfigError::invalid(
                "qos",
                format!("{} is not one of 0, 1, 2", self.qos),
            ));
        }
        // 0 disables keep-alive; the wire field is 16 bits
        if self.keep_alive > u64::from(u16::MAX) {
            return Err(ConfigError::invalid(
                "keep_alive",
                format!("{}s is above {}", self.keep_alive, u16::MAX),
            ));
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// MQTT topic filter rules: non-empty, `+` fills a whole level, `#` only as the
/// whole last level
pub fn is_valid_topic_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;

    levels.iter().enumerate().all(|(index, level)| {
        if level.contains('#') {
            return *level == "#" && index == last;
        }
        !level.contains('+') || *level == "+"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.broker, "broker.emqx.io");
        assert_eq!(config.port, 1883);
        assert_eq!(config.topic, "Rubicon/BMS/Default/Raw");
        assert!(config.clean_session);
        assert!(config.reconnect_on_failure);
    }

    #[test]
    fn test_integer_parse_failure_falls_back() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("QOS", "high"),
            ("KEEP_ALIVE", ""),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.qos, DEFAULT_QOS);
        assert_eq!(config.keep_alive, DEFAULT_KEEP_ALIVE);
    }

    #[test]
    fn test_boolean_requires_literal_true() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CLEAN_SESSION", "true"),
            ("RECONNECT_ON_FAILURE", "True"),
        ]));
        assert!(!config.clean_session);
        assert!(config.reconnect_on_failure);
    }

    #[test]
    fn test_none_sentinel_clears_credentials() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("USERNAME", "None"),
            ("PASSWORD", "None"),
        ]));
        assert_eq!(config.username, None);
        assert_eq!(config.password, None);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_first_violation() {
        let config = ClientConfig {
            port: 0,
            qos: 7,
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidField { field, .. }) => assert_eq!(field, "port"),
            other => panic!("expected port violation, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let cases = vec![
            ClientConfig {
                broker: " ".to_string(),
                ..Default::default()
            },
            ClientConfig {
                port: 70_000,
                ..Default::default()
            },
            ClientConfig {
                qos: 3,
                ..Default::default()
            },
            ClientConfig {
                keep_alive: 100_000,
                ..Default::default()
            },
            ClientConfig {
                topic: "a/#/b".to_string(),
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(config.validate().is_err(), "should reject {config:?}");
        }
    }

    #[test]
    fn test_validate_accepts_short_keep_alive_and_loose_client_ids() {
        let cases = vec![
            ClientConfig {
                keep_alive: 0,
                ..Default::default()
            },
            ClientConfig {
                keep_alive: 2,
                ..Default::default()
            },
            ClientConfig {
                keep_alive: 65_535,
                ..Default::default()
            },
            ClientConfig {
                client_id: " leading space".to_string(),
                ..Default::default()
            },
        ];

        for config in cases {
            assert!(config.validate().is_ok(), "should accept {config:?}");
        }
    }

    #[test]
    fn test_topic_filter_rules() {
        assert!(is_valid_topic_filter("Rubicon/BMS/Default/Raw"));
        assert!(is_valid_topic_filter("Rubicon/+/Default/#"));
        assert!(is_valid_topic_filter("#"));
        assert!(!is_valid_topic_filter(""));
        assert!(!is_valid_topic_filter("Rubicon/BMS#"));
        assert!(!is_valid_topic_filter("Rubicon/B+/Raw"));
    }

    #[test]
    fn test_generated_client_id_uses_base_name() {
        let config = ClientConfig::default().with_generated_client_id(9).unwrap();
        assert!(config.client_id.starts_with("BMS-Client-"));
        assert_eq!(config.client_id.len(), "BMS-Client-".len() + 9);
    }

    #[test]
    fn test_redacted_masks_password_only() {
        let config = ClientConfig {
            username: Some("operator".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let redacted = config.redacted();
        assert_eq!(redacted.username.as_deref(), Some("operator"));
        assert_eq!(redacted.password.as_deref(), Some("***"));
    }
}
