//! Pure event routing and payload decoding
//!
//! Translates rumqttc events and connection errors into [`EngineEvent`]s and
//! decodes received payloads for logging.

use crate::transport::{DisconnectReason, EngineEvent};
use rumqttc::{ConnectionError, Event, Outgoing, Packet};
use serde_json::Value;
use std::fmt;

/// Decoded message payload
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// Payload parsed as JSON
    Json(Value),
    /// Payload kept as (lossily decoded) UTF-8 text
    Text(String),
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Json(value) => write!(f, "{value}"),
            PayloadValue::Text(text) => f.write_str(text),
        }
    }
}

/// Pure routing decisions for rumqttc events
pub struct MessageHandler;

impl MessageHandler {
    /// Route a successfully polled rumqttc event (pure function)
    pub fn route_event(event: &Event) -> EngineEvent {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => EngineEvent::ConnAck(connack.code),
                Packet::Publish(publish) => EngineEvent::Message {
                    topic: publish.topic.clone(),
                    payload: publish.payload.clone(),
                },
                Packet::SubAck(suback) => EngineEvent::SubAck {
                    pkid: suback.pkid,
                    granted: suback.return_codes.clone(),
                },
                Packet::Disconnect => EngineEvent::Disconnected(DisconnectReason::Unexpected(
                    "Broker sent DISCONNECT".to_string(),
                )),
                other => EngineEvent::Log(format!("Received {other:?}")),
            },
            Event::Outgoing(Outgoing::Disconnect) => {
                EngineEvent::Disconnected(DisconnectReason::Requested)
            }
            Event::Outgoing(outgoing) => EngineEvent::Log(format!("Sent {outgoing:?}")),
        }
    }

    /// Route a connection error into the events it implies (pure function)
    ///
    /// A refused CONNACK first reports the result code, then the loss of the
    /// connection, so retrying stays driven by the disconnect.
    pub fn route_connection_error(error: &ConnectionError) -> Vec<EngineEvent> {
        let lost = EngineEvent::Disconnected(DisconnectReason::Unexpected(error.to_string()));
        match error {
            ConnectionError::ConnectionRefused(code) => vec![EngineEvent::ConnAck(*code), lost],
            _ => vec![lost],
        }
    }

    /// Whether a poll error means the broker was never reached (pure function)
    ///
    /// Until a CONNACK has arrived, failures end the session instead of
    /// entering the reconnect cycle. A refused CONNACK counts as reaching the
    /// broker.
    pub fn is_initial_connect_failure(error: &ConnectionError, connack_seen: bool) -> bool {
        !connack_seen && !matches!(error, ConnectionError::ConnectionRefused(_))
    }

    /// Decode a payload for logging (pure function)
    ///
    /// Never fails: invalid UTF-8 is replaced, non-JSON text is kept as-is.
    pub fn decode_payload(payload: &[u8]) -> PayloadValue {
        let text = String::from_utf8_lossy(payload);
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => PayloadValue::Json(value),
            Err(_) => PayloadValue::Text(text.into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish, QoS, SubAck, SubscribeReasonCode};
    use serde_json::json;

    #[test]
    fn test_route_connack() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::Success,
            false,
        )));
        assert_eq!(
            MessageHandler::route_event(&event),
            EngineEvent::ConnAck(ConnectReturnCode::Success)
        );
    }

    #[test]
    fn test_route_publish() {
        let publish = Publish::new("Rubicon/BMS/Default/Raw", QoS::AtMostOnce, "{\"x\":1}");
        let event = Event::Incoming(Packet::Publish(publish));

        match MessageHandler::route_event(&event) {
            EngineEvent::Message { topic, payload } => {
                assert_eq!(topic, "Rubicon/BMS/Default/Raw");
                assert_eq!(&payload[..], b"{\"x\":1}");
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_route_suback() {
        let suback = SubAck::new(7, vec![SubscribeReasonCode::Success(QoS::AtLeastOnce)]);
        let event = Event::Incoming(Packet::SubAck(suback));
        assert_eq!(
            MessageHandler::route_event(&event),
            EngineEvent::SubAck {
                pkid: 7,
                granted: vec![SubscribeReasonCode::Success(QoS::AtLeastOnce)],
            }
        );
    }

    #[test]
    fn test_route_disconnects() {
        let outgoing = Event::Outgoing(Outgoing::Disconnect);
        assert_eq!(
            MessageHandler::route_event(&outgoing),
            EngineEvent::Disconnected(DisconnectReason::Requested)
        );

        let incoming = Event::Incoming(Packet::Disconnect);
        assert!(matches!(
            MessageHandler::route_event(&incoming),
            EngineEvent::Disconnected(DisconnectReason::Unexpected(_))
        ));
    }

    #[test]
    fn test_route_infrastructure_events_to_log() {
        let ping = Event::Incoming(Packet::PingResp);
        assert!(matches!(
            MessageHandler::route_event(&ping),
            EngineEvent::Log(line) if line.contains("PingResp")
        ));

        let outgoing = Event::Outgoing(Outgoing::PingReq);
        assert!(matches!(
            MessageHandler::route_event(&outgoing),
            EngineEvent::Log(line) if line.contains("PingReq")
        ));
    }

    #[test]
    fn test_route_refused_connection() {
        let error = ConnectionError::ConnectionRefused(ConnectReturnCode::NotAuthorized);
        let events = MessageHandler::route_connection_error(&error);

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            EngineEvent::ConnAck(ConnectReturnCode::NotAuthorized)
        );
        assert!(matches!(
            events[1],
            EngineEvent::Disconnected(DisconnectReason::Unexpected(_))
        ));
    }

    #[test]
    fn test_route_network_error() {
        let error = ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        let events = MessageHandler::route_connection_error(&error);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            EngineEvent::Disconnected(DisconnectReason::Unexpected(reason)) if reason.contains("reset by peer")
        ));
    }

    #[test]
    fn test_initial_connect_failure() {
        let unreachable = ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        let refused = ConnectionError::ConnectionRefused(ConnectReturnCode::NotAuthorized);

        assert!(MessageHandler::is_initial_connect_failure(&unreachable, false));
        assert!(!MessageHandler::is_initial_connect_failure(&unreachable, true));
        assert!(!MessageHandler::is_initial_connect_failure(&refused, false));
        assert!(!MessageHandler::is_initial_connect_failure(
            &ConnectionError::NetworkTimeout,
            true
        ));
    }

    #[test]
    fn test_decode_json_payload() {
        assert_eq!(
            MessageHandler::decode_payload(b"{\"x\":1}"),
            PayloadValue::Json(json!({"x": 1}))
        );
        assert_eq!(
            MessageHandler::decode_payload(b"42"),
            PayloadValue::Json(json!(42))
        );
    }

    #[test]
    fn test_decode_text_payload() {
        assert_eq!(
            MessageHandler::decode_payload(b"hello"),
            PayloadValue::Text("hello".to_string())
        );
    }

    #[test]
    fn test_decode_invalid_utf8_does_not_fail() {
        let decoded = MessageHandler::decode_payload(&[0x68, 0x69, 0xff]);
        assert_eq!(decoded, PayloadValue::Text("hi\u{fffd}".to_string()));
    }

    #[test]
    fn test_payload_display() {
        assert_eq!(
            PayloadValue::Json(json!({"cell": 3})).to_string(),
            "{\"cell\":3}"
        );
        assert_eq!(PayloadValue::Text("raw".to_string()).to_string(), "raw");
    }
}
