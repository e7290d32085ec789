//! MQTT client controller
//!
//! Owns the configuration, validates it, drives the connection lifecycle and
//! applies the reconnection policy. The protocol engine is injected through
//! [`Connector`], so the same controller runs against rumqttc in production and
//! a scripted engine in tests.
//!
//! Reactions to engine events live behind [`LifecycleHandler`]. They run
//! sequentially on the event loop, so the reconnect delay inside
//! [`LifecycleHandler::on_disconnect`] holds back every later event until it
//! has elapsed.

use crate::config::{ClientConfig, ConfigError};
use crate::mqtt_span;
use crate::transport::mqtt::{
    qos_from_level, ConnectionEvent, ConnectionState, LifecycleMonitor, MessageHandler,
    MqttError, PayloadValue, RumqttcConnector, RECONNECT_DELAY,
};
use crate::transport::{Connector, DisconnectReason, EngineEvent, ProtocolEngine};
use async_trait::async_trait;
use rumqttc::{ConnectReturnCode, SubscribeReasonCode};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, Instrument, Span};

/// How a call to [`MqttController::connect`] ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// Configuration failed validation; nothing was sent
    InvalidConfig(ConfigError),
    /// Operator interrupt; the connection was closed cleanly
    Interrupted,
    /// The connection ended and was not re-established
    ConnectionClosed,
    /// The engine failed; the connection was torn down
    TransportFailed(String),
}

impl SessionOutcome {
    /// Whether the session ended on a normal path
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SessionOutcome::Interrupted | SessionOutcome::ConnectionClosed
        )
    }
}

/// Reactions to protocol engine events
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// CONNACK received. On success subscribe to the configured topic.
    async fn on_connect(
        &self,
        engine: &mut dyn ProtocolEngine,
        code: ConnectReturnCode,
    ) -> Result<(), MqttError>;

    /// Connection ended. Unexpected losses may trigger a delayed reconnect.
    async fn on_disconnect(
        &self,
        engine: &mut dyn ProtocolEngine,
        reason: DisconnectReason,
    ) -> Result<(), MqttError>;

    /// SUBACK received
    async fn on_subscribe(&self, pkid: u16, granted: &[SubscribeReasonCode]);

    /// PUBLISH received; returns the decoded payload that was logged
    async fn on_message(&self, topic: &str, payload: &[u8]) -> PayloadValue;

    /// Engine diagnostic line
    async fn on_log(&self, line: &str);
}

enum LoopExit {
    Finished(Result<(), MqttError>),
    Interrupted,
}

/// Single-topic MQTT client with reconnect-on-failure
pub struct MqttController {
    config: ClientConfig,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    span: Span,
}

impl MqttController {
    pub fn new(config: ClientConfig) -> Self {
        let span = mqtt_span!(
            client_id = %config.client_id,
            broker = %config.broker,
            port = config.port
        );
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            config,
            reconnect_delay: RECONNECT_DELAY,
            state_tx,
            span,
        }
    }

    /// Override the wait before reconnecting after an unexpected disconnect
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Connect with rumqttc and service the connection until Ctrl-C or until
    /// the connection ends for good. Never returns an error; see
    /// [`SessionOutcome`].
    pub async fn connect(&self) -> SessionOutcome {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("[CLIENT] Unable to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            debug!("[CLIENT] Keyboard interrupt detected. Exiting.");
        };

        self.connect_with(&RumqttcConnector::default(), interrupt)
            .await
    }

    /// Connect through `connector` and run until `shutdown` resolves or the
    /// connection ends for good
    pub async fn connect_with<C, S>(&self, connector: &C, shutdown: S) -> SessionOutcome
    where
        C: Connector,
        S: Future<Output = ()>,
    {
        self.run_session(connector, shutdown)
            .instrument(self.span.clone())
            .await
    }

    async fn run_session<C, S>(&self, connector: &C, shutdown: S) -> SessionOutcome
    where
        C: Connector,
        S: Future<Output = ()>,
    {
        debug!("[CLIENT] Connecting MQTT client.");
        debug!("[CLIENT] Validating configuration.");
        if let Err(e) = self.config.validate() {
            error!("[CLIENT] {}", e);
            return SessionOutcome::InvalidConfig(e);
        }

        self.log_connection_parameters();
        self.transition(ConnectionEvent::ConnectStarted);

        let mut engine = match connector.open(&self.config) {
            Ok(engine) => engine,
            Err(e) => {
                error!("[CLIENT] Error connecting to MQTT broker: {}", e);
                self.transition(ConnectionEvent::Shutdown);
                return SessionOutcome::TransportFailed(e.to_string());
            }
        };

        let exit = tokio::select! {
            result = self.run_event_loop(&mut engine) => LoopExit::Finished(result),
            _ = shutdown => LoopExit::Interrupted,
        };

        match exit {
            LoopExit::Interrupted => {
                self.shutdown_engine(&mut engine).await;
                SessionOutcome::Interrupted
            }
            LoopExit::Finished(Ok(())) => {
                info!("[CLIENT] Event loop finished");
                SessionOutcome::ConnectionClosed
            }
            LoopExit::Finished(Err(e)) => {
                error!("[CLIENT] Error connecting to MQTT broker: {}", e);
                self.shutdown_engine(&mut engine).await;
                SessionOutcome::TransportFailed(e.to_string())
            }
        }
    }

    /// Poll the engine and dispatch events until a disconnect leaves the
    /// connection inactive
    async fn run_event_loop<E: ProtocolEngine>(&self, engine: &mut E) -> Result<(), MqttError> {
        loop {
            let event = engine.poll().await?;
            let ends_connection = matches!(event, EngineEvent::Disconnected(_));
            self.dispatch(engine, event).await?;

            if ends_connection && !LifecycleMonitor::is_active(&self.state()) {
                return Ok(());
            }
        }
    }

    async fn dispatch<E: ProtocolEngine>(
        &self,
        engine: &mut E,
        event: EngineEvent,
    ) -> Result<(), MqttError> {
        match event {
            EngineEvent::ConnAck(code) => self.on_connect(engine, code).await,
            EngineEvent::Disconnected(reason) => self.on_disconnect(engine, reason).await,
            EngineEvent::SubAck { pkid, granted } => {
                self.on_subscribe(pkid, &granted).await;
                Ok(())
            }
            EngineEvent::Message { topic, payload } => {
                self.on_message(&topic, &payload).await;
                Ok(())
            }
            EngineEvent::Log(line) => {
                self.on_log(&line).await;
                Ok(())
            }
        }
    }

    /// Issue exactly one disconnect and mark the session terminated
    async fn shutdown_engine<E: ProtocolEngine>(&self, engine: &mut E) {
        if let Err(e) = engine.disconnect().await {
            error!("[CLIENT] Error disconnecting from MQTT broker: {}", e);
        }
        self.transition(ConnectionEvent::Shutdown);
        info!("[CLIENT] Disconnected from broker");
    }

    fn transition(&self, event: ConnectionEvent) -> ConnectionState {
        let current = self.state();
        let next = LifecycleMonitor::determine_next_state(&current, event);
        LifecycleMonitor::log_state_transition(&current, &next);
        self.state_tx.send_replace(next);
        next
    }

    fn log_connection_parameters(&self) {
        debug!(
            "[CLIENT] Connecting to broker: {}:{}.",
            self.config.broker, self.config.port
        );
        debug!("[CLIENT] Client ID: {}", self.config.client_id);
        debug!("[CLIENT] Clean session: {}", self.config.clean_session);
        debug!("[CLIENT] Keep alive: {}", self.config.keep_alive);
        debug!(
            "[CLIENT] Reconnect on failure: {}",
            self.config.reconnect_on_failure
        );
    }
}

#[async_trait]
impl LifecycleHandler for MqttController {
    async fn on_connect(
        &self,
        engine: &mut dyn ProtocolEngine,
        code: ConnectReturnCode,
    ) -> Result<(), MqttError> {
        if code != ConnectReturnCode::Success {
            error!(
                "[CLIENT] Failed to connect to broker with result code: {:?}",
                code
            );
            self.transition(ConnectionEvent::ConnAckRefused);
            return Ok(());
        }

        info!("[CLIENT] Connected to broker with result code: {:?}", code);
        self.transition(ConnectionEvent::ConnAckAccepted);

        info!("[CLIENT] Subscribing to topic: {}", self.config.topic);
        let qos = qos_from_level(self.config.qos)?;
        engine.subscribe(&self.config.topic, qos).await?;
        self.transition(ConnectionEvent::SubscribeSent);
        Ok(())
    }

    async fn on_disconnect(
        &self,
        engine: &mut dyn ProtocolEngine,
        reason: DisconnectReason,
    ) -> Result<(), MqttError> {
        let cause = match reason {
            DisconnectReason::Requested => {
                info!("[CLIENT] Disconnected from broker");
                self.transition(ConnectionEvent::ClosedCleanly);
                return Ok(());
            }
            DisconnectReason::Unexpected(cause) => cause,
        };

        error!("[CLIENT] Unexpected disconnection: {}", cause);
        let reconnect = self.config.reconnect_on_failure;
        self.transition(ConnectionEvent::LostUnexpectedly { reconnect });
        if !reconnect {
            return Ok(());
        }

        info!(
            "[CLIENT] Reconnecting to the broker in {}s...",
            self.reconnect_delay.as_secs_f64()
        );
        tokio::time::sleep(self.reconnect_delay).await;

        engine.reconnect().await?;
        self.transition(ConnectionEvent::ReconnectIssued);
        Ok(())
    }

    async fn on_subscribe(&self, pkid: u16, granted: &[SubscribeReasonCode]) {
        info!(
            "[CLIENT] Subscribed with mid: {}, granted QoS: {:?}",
            pkid, granted
        );
    }

    async fn on_message(&self, topic: &str, payload: &[u8]) -> PayloadValue {
        let value = MessageHandler::decode_payload(payload);
        info!("[MESSAGE] Message received on topic {}: {}", topic, value);
        value
    }

    async fn on_log(&self, line: &str) {
        debug!("[CLIENT] Log: {}", line);
    }
}
