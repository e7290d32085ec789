//! Impure I/O operations for the rumqttc engine
//!
//! This module owns the rumqttc `AsyncClient` / `EventLoop` pair and adapts it
//! to the [`ProtocolEngine`] seam. All routing decisions are delegated to the
//! pure functions in [`super::message_handler`].

use super::connection::{configure_mqtt_options, MqttError};
use super::message_handler::MessageHandler;
use crate::config::ClientConfig;
use crate::transport::{Connector, EngineEvent, ProtocolEngine};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, QoS};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Capacity of the request channel between `AsyncClient` and `EventLoop`
const DEFAULT_REQUEST_CAPACITY: usize = 10;

/// Upper bound on draining the event loop while a DISCONNECT goes out
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens rumqttc engines
#[derive(Debug, Clone)]
pub struct RumqttcConnector {
    pub request_capacity: usize,
}

impl Default for RumqttcConnector {
    fn default() -> Self {
        Self {
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        }
    }
}

impl Connector for RumqttcConnector {
    type Engine = RumqttcEngine;

    fn open(&self, config: &ClientConfig) -> Result<Self::Engine, MqttError> {
        let mqtt_options = configure_mqtt_options(config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, self.request_capacity);
        Ok(RumqttcEngine::new(client, event_loop))
    }
}

/// Protocol engine backed by rumqttc
///
/// rumqttc connects lazily: the TCP connection and CONNECT handshake happen on
/// the first poll, and a poll after a connection error reconnects with the
/// same options. Failing to reach the broker before the first CONNACK is an
/// error rather than a disconnect.
pub struct RumqttcEngine {
    client: AsyncClient,
    event_loop: EventLoop,
    pending: VecDeque<EngineEvent>,
    reconnect_requested: bool,
    connack_seen: bool,
    link_up: bool,
}

impl RumqttcEngine {
    pub fn new(client: AsyncClient, event_loop: EventLoop) -> Self {
        Self {
            client,
            event_loop,
            pending: VecDeque::new(),
            reconnect_requested: false,
            connack_seen: false,
            link_up: false,
        }
    }

    /// Whether the broker accepted the current connection
    pub fn is_link_up(&self) -> bool {
        self.link_up
    }

    fn track_link(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::ConnAck(code) => {
                self.connack_seen = true;
                self.link_up = *code == ConnectReturnCode::Success;
            }
            EngineEvent::Disconnected(_) => self.link_up = false,
            _ => {}
        }
    }

    /// Poll until the DISCONNECT packet has been written or the connection drops
    async fn flush_disconnect(&mut self) -> Result<(), rumqttc::ConnectionError> {
        loop {
            if let Event::Outgoing(Outgoing::Disconnect) = self.event_loop.poll().await? {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl ProtocolEngine for RumqttcEngine {
    async fn poll(&mut self) -> Result<EngineEvent, MqttError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(event);
        }

        match self.event_loop.poll().await {
            Ok(event) => {
                if self.reconnect_requested {
                    self.reconnect_requested = false;
                    debug!(target: "mqtt_transport", "Connection re-established after reconnect request");
                }
                let routed = MessageHandler::route_event(&event);
                self.track_link(&routed);
                Ok(routed)
            }
            Err(error) => {
                self.link_up = false;
                if MessageHandler::is_initial_connect_failure(&error, self.connack_seen) {
                    return Err(MqttError::Transport(error.to_string()));
                }
                if matches!(error, ConnectionError::ConnectionRefused(_)) {
                    self.connack_seen = true;
                }

                self.pending
                    .extend(MessageHandler::route_connection_error(&error));
                self.pending
                    .pop_front()
                    .ok_or_else(|| MqttError::Transport(error.to_string()))
            }
        }
    }

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), MqttError> {
        self.client
            .subscribe(topic, qos)
            .await
            .map_err(|e| MqttError::SubscriptionFailed(Box::new(e)))
    }

    async fn reconnect(&mut self) -> Result<(), MqttError> {
        // The next poll re-runs the TCP connect and CONNECT handshake.
        self.reconnect_requested = true;
        self.pending.clear();
        info!("[CLIENT] Reconnect requested");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        // Polling without a live link would dial the broker just to hang up
        if !self.link_up {
            debug!(target: "mqtt_transport", "No live connection, DISCONNECT skipped");
            return Ok(());
        }

        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::DisconnectFailed(Box::new(e)))?;

        match tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, self.flush_disconnect()).await {
            Ok(Ok(())) => debug!(target: "mqtt_transport", "DISCONNECT sent"),
            Ok(Err(e)) => debug!(target: "mqtt_transport", "Connection closed before DISCONNECT: {}", e),
            Err(_) => warn!("[CLIENT] Timed out sending DISCONNECT"),
        }
        Ok(())
    }
}
