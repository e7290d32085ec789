//! Protocol engine abstraction
//!
//! The controller never speaks MQTT framing itself. It drives a
//! [`ProtocolEngine`], which turns network activity into [`EngineEvent`]s and
//! accepts subscribe / reconnect / disconnect requests. The production engine
//! wraps rumqttc; tests substitute a scripted engine.

use crate::config::ClientConfig;
use bytes::Bytes;
use rumqttc::{ConnectReturnCode, QoS, SubscribeReasonCode};

pub mod mqtt;

pub use mqtt::MqttError;

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client asked for the disconnect
    Requested,
    /// The connection was lost or closed by the broker
    Unexpected(String),
}

/// Lifecycle events surfaced by the protocol engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// CONNACK received (or connection refused) with the broker's result code
    ConnAck(ConnectReturnCode),
    /// SUBACK received
    SubAck {
        pkid: u16,
        granted: Vec<SubscribeReasonCode>,
    },
    /// PUBLISH received on a subscribed topic
    Message { topic: String, payload: Bytes },
    /// Connection ended
    Disconnected(DisconnectReason),
    /// Engine-level diagnostic line
    Log(String),
}

/// Connection-level operations the controller needs from an MQTT library
#[async_trait::async_trait]
pub trait ProtocolEngine: Send {
    /// Service the connection until the next lifecycle event
    async fn poll(&mut self) -> Result<EngineEvent, MqttError>;

    /// Send a SUBSCRIBE request
    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), MqttError>;

    /// Re-establish the connection on the same transport settings
    async fn reconnect(&mut self) -> Result<(), MqttError>;

    /// Send DISCONNECT and close the connection
    async fn disconnect(&mut self) -> Result<(), MqttError>;
}

/// Opens protocol engines for a configuration
pub trait Connector {
    type Engine: ProtocolEngine;

    /// Create an engine that will connect to the configured broker
    fn open(&self, config: &ClientConfig) -> Result<Self::Engine, MqttError>;
}
