//! Pure connection state management for the MQTT engine
//!
//! This module contains pure functions for connection state, option building
//! and QoS conversion.

use crate::config::ClientConfig;
use rumqttc::{MqttOptions, QoS};
use std::time::Duration;
use thiserror::Error;

/// Fixed wait between an unexpected disconnect and the reconnect request
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Largest packet MQTT 3.1.1 can encode (remaining length limit)
pub const MAX_INCOMING_PACKET_SIZE: usize = 268_435_455;

/// Outgoing traffic is CONNECT, SUBSCRIBE and control packets only
const MAX_OUTGOING_PACKET_SIZE: usize = 10 * 1024;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none pending
    Disconnected,
    /// CONNECT sent, waiting for CONNACK
    Connecting,
    /// CONNACK accepted
    Connected,
    /// SUBSCRIBE issued for the configured topic
    Subscribed,
    /// Waiting out the reconnect delay
    Reconnecting,
    /// Shut down cleanly; no further transitions
    Terminated,
}

/// MQTT engine errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Disconnect failed: {0}")]
    DisconnectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid QoS level: {0}")]
    InvalidQos(u8),
}

/// Convert a numeric QoS level into the engine's type
pub fn qos_from_level(level: u8) -> Result<QoS, MqttError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(other)),
    }
}

/// Build rumqttc options from a validated configuration.
///
/// Credentials are attached only when a username is present. A password
/// without a username is dropped, and a missing password with a username
/// becomes the empty string.
pub fn configure_mqtt_options(config: &ClientConfig) -> Result<MqttOptions, MqttError> {
    let port = u16::try_from(config.port)
        .map_err(|_| MqttError::ConnectionFailed(format!("Port {} out of range", config.port)))?;

    let mut mqtt_options = MqttOptions::new(config.client_id.clone(), config.broker.clone(), port);
    mqtt_options.set_clean_session(config.clean_session);
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive));
    // rumqttc defaults to 10 KiB and fails the connection on larger PUBLISHes
    mqtt_options.set_max_packet_size(MAX_INCOMING_PACKET_SIZE, MAX_OUTGOING_PACKET_SIZE);

    if let Some(username) = &config.username {
        let password = config.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username.clone(), password);
    }

    Ok(mqtt_options)
}
