//! rumqttc-backed protocol engine
//!
//! The module is split the same way as the rest of the transport layer:
//!
//! - [`connection`] - Pure connection state, options building and errors
//! - [`message_handler`] - Pure event routing and payload decoding
//! - [`lifecycle`] - Pure connection state transitions
//! - [`client`] - Impure I/O against the rumqttc event loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use bms_listener::config::ClientConfig;
//! use bms_listener::transport::mqtt::RumqttcConnector;
//! use bms_listener::transport::{Connector, ProtocolEngine};
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig::default().with_generated_client_id(9)?;
//! let mut engine = RumqttcConnector::default().open(&config)?;
//! let event = engine.poll().await?;
//! println!("first event: {event:?}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod lifecycle;
pub mod message_handler;

pub use client::{RumqttcConnector, RumqttcEngine};
pub use connection::{
    configure_mqtt_options, qos_from_level, ConnectionState, MqttError, RECONNECT_DELAY,
};
pub use lifecycle::{ConnectionEvent, LifecycleMonitor};
pub use message_handler::{MessageHandler, PayloadValue};
