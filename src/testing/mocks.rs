//! Mock protocol engine for testing
//!
//! [`MockEngine`] replays a script of engine events and records every request
//! the controller makes, so lifecycle behaviour can be asserted without a
//! broker. Once the script is exhausted, `poll` never resolves, like an idle
//! connection.

use crate::config::ClientConfig;
use crate::transport::{Connector, DisconnectReason, EngineEvent, MqttError, ProtocolEngine};
use async_trait::async_trait;
use rumqttc::{ConnectReturnCode, QoS};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Request issued to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Subscribe { topic: String, qos: QoS },
    Reconnect,
    Disconnect,
}

/// Shared, timestamped record of engine requests
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(EngineCall, Instant)>>>,
}

impl CallLog {
    fn record(&self, call: EngineCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((call, Instant::now()));
        }
    }

    /// Requests in the order they were made
    pub fn calls(&self) -> Vec<EngineCall> {
        self.timed_calls().into_iter().map(|(call, _)| call).collect()
    }

    /// Requests with the instant each was made
    pub fn timed_calls(&self) -> Vec<(EngineCall, Instant)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Number of recorded requests equal to `call`
    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Number of SUBSCRIBE requests, whatever the topic
    pub fn subscribe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Subscribe { .. }))
            .count()
    }
}

/// Scripted protocol engine
#[derive(Debug, Default)]
pub struct MockEngine {
    script: VecDeque<Result<EngineEvent, MqttError>>,
    log: CallLog,
    fail_subscribe: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose polls yield `events` in order
    pub fn with_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = EngineEvent>,
    {
        Self {
            script: events.into_iter().map(Ok).collect(),
            ..Default::default()
        }
    }

    /// Append a successful poll result
    pub fn push_event(&mut self, event: EngineEvent) {
        self.script.push_back(Ok(event));
    }

    /// Append a failing poll result
    pub fn push_error(&mut self, error: MqttError) {
        self.script.push_back(Err(error));
    }

    /// Make every subscribe request fail
    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Handle to the request log that survives handing the engine over
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl ProtocolEngine for MockEngine {
    async fn poll(&mut self) -> Result<EngineEvent, MqttError> {
        match self.script.pop_front() {
            Some(next) => next,
            None => std::future::pending().await,
        }
    }

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), MqttError> {
        self.log.record(EngineCall::Subscribe {
            topic: topic.to_string(),
            qos,
        });
        if self.fail_subscribe {
            return Err(MqttError::SubscriptionFailed(
                "Mock subscribe failure".into(),
            ));
        }
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), MqttError> {
        self.log.record(EngineCall::Reconnect);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        self.log.record(EngineCall::Disconnect);
        Ok(())
    }
}

/// Connector handing out a single prepared [`MockEngine`]
#[derive(Debug, Default)]
pub struct MockConnector {
    engine: Mutex<Option<MockEngine>>,
    opens: AtomicUsize,
}

impl MockConnector {
    pub fn new(engine: MockEngine) -> Self {
        Self {
            engine: Mutex::new(Some(engine)),
            opens: AtomicUsize::new(0),
        }
    }

    /// How many times `open` was called
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Engine = MockEngine;

    fn open(&self, _config: &ClientConfig) -> Result<Self::Engine, MqttError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.engine
            .lock()
            .ok()
            .and_then(|mut engine| engine.take())
            .ok_or_else(|| MqttError::ConnectionFailed("Mock engine already opened".to_string()))
    }
}

/// Event script helpers
pub fn connack(code: ConnectReturnCode) -> EngineEvent {
    EngineEvent::ConnAck(code)
}

pub fn unexpected_disconnect(cause: &str) -> EngineEvent {
    EngineEvent::Disconnected(DisconnectReason::Unexpected(cause.to_string()))
}

pub fn message(topic: &str, payload: &'static [u8]) -> EngineEvent {
    EngineEvent::Message {
        topic: topic.to_string(),
        payload: bytes::Bytes::from_static(payload),
    }
}
