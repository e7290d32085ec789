//! Pure connection state transitions
//!
//! Every lifecycle reaction reports what happened as a [`ConnectionEvent`];
//! the next [`ConnectionState`] is derived here so the transition table can be
//! tested without a broker.

use super::connection::ConnectionState;
use tracing::{debug, info, warn};

/// Lifecycle facts that move the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// CONNECT (or reconnect) handed to the engine
    ConnectStarted,
    /// Broker accepted the connection
    ConnAckAccepted,
    /// Broker refused the connection
    ConnAckRefused,
    /// SUBSCRIBE sent for the configured topic
    SubscribeSent,
    /// Connection lost without being asked to
    LostUnexpectedly { reconnect: bool },
    /// Reconnect request issued after the delay
    ReconnectIssued,
    /// Disconnect completed at the client's request
    ClosedCleanly,
    /// Operator interrupt or fatal error tore the session down
    Shutdown,
}

/// Pure lifecycle decisions
pub struct LifecycleMonitor;

impl LifecycleMonitor {
    /// Determine next state after a lifecycle event (pure function)
    ///
    /// `Terminated` is absorbing: nothing moves the machine out of it.
    pub fn determine_next_state(
        current_state: &ConnectionState,
        event: ConnectionEvent,
    ) -> ConnectionState {
        if *current_state == ConnectionState::Terminated {
            return ConnectionState::Terminated;
        }

        match event {
            ConnectionEvent::ConnectStarted | ConnectionEvent::ReconnectIssued => {
                ConnectionState::Connecting
            }
            ConnectionEvent::ConnAckAccepted => ConnectionState::Connected,
            ConnectionEvent::ConnAckRefused => ConnectionState::Disconnected,
            ConnectionEvent::SubscribeSent => ConnectionState::Subscribed,
            ConnectionEvent::LostUnexpectedly { reconnect: true } => ConnectionState::Reconnecting,
            ConnectionEvent::LostUnexpectedly { reconnect: false } => {
                ConnectionState::Disconnected
            }
            ConnectionEvent::ClosedCleanly | ConnectionEvent::Shutdown => {
                ConnectionState::Terminated
            }
        }
    }

    /// Whether the event loop should keep servicing the connection
    pub fn is_active(state: &ConnectionState) -> bool {
        !matches!(
            state,
            ConnectionState::Disconnected | ConnectionState::Terminated
        )
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("[CLIENT] MQTT connection established");
            }
            (ConnectionState::Reconnecting, ConnectionState::Connecting) => {
                info!("[CLIENT] Reconnection started");
            }
            (_, ConnectionState::Reconnecting) => {
                warn!("[CLIENT] MQTT connection lost, reconnect scheduled");
            }
            (from, to) if from == to => {}
            (from, to) => {
                debug!("[CLIENT] State transition: {:?} -> {:?}", from, to);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = ConnectionState::Disconnected;
        let events = [
            (ConnectionEvent::ConnectStarted, ConnectionState::Connecting),
            (ConnectionEvent::ConnAckAccepted, ConnectionState::Connected),
            (ConnectionEvent::SubscribeSent, ConnectionState::Subscribed),
            (ConnectionEvent::ClosedCleanly, ConnectionState::Terminated),
        ];

        for (event, expected) in events {
            state = LifecycleMonitor::determine_next_state(&state, event);
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn test_reconnect_cycle() {
        let lost = LifecycleMonitor::determine_next_state(
            &ConnectionState::Subscribed,
            ConnectionEvent::LostUnexpectedly { reconnect: true },
        );
        assert_eq!(lost, ConnectionState::Reconnecting);

        let retry =
            LifecycleMonitor::determine_next_state(&lost, ConnectionEvent::ReconnectIssued);
        assert_eq!(retry, ConnectionState::Connecting);
    }

    #[test]
    fn test_loss_without_reconnect_stays_disconnected() {
        let state = LifecycleMonitor::determine_next_state(
            &ConnectionState::Subscribed,
            ConnectionEvent::LostUnexpectedly { reconnect: false },
        );
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(!LifecycleMonitor::is_active(&state));
    }

    #[test]
    fn test_refused_connection_is_disconnected() {
        let state = LifecycleMonitor::determine_next_state(
            &ConnectionState::Connecting,
            ConnectionEvent::ConnAckRefused,
        );
        assert_eq!(state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_terminated_is_absorbing() {
        for event in [
            ConnectionEvent::ConnectStarted,
            ConnectionEvent::ConnAckAccepted,
            ConnectionEvent::ReconnectIssued,
            ConnectionEvent::LostUnexpectedly { reconnect: true },
        ] {
            assert_eq!(
                LifecycleMonitor::determine_next_state(&ConnectionState::Terminated, event),
                ConnectionState::Terminated
            );
        }
    }

    #[test]
    fn test_active_states() {
        assert!(LifecycleMonitor::is_active(&ConnectionState::Connecting));
        assert!(LifecycleMonitor::is_active(&ConnectionState::Subscribed));
        assert!(LifecycleMonitor::is_active(&ConnectionState::Reconnecting));
        assert!(!LifecycleMonitor::is_active(&ConnectionState::Terminated));
    }
}
