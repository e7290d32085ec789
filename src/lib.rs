//! BMS listener
//!
//! A configurable MQTT client that subscribes to a single topic, logs every
//! message it receives and reconnects after unexpected disconnects.
//!
//! # Overview
//!
//! - [`id_generator`] - collision-resistant client identifiers
//! - [`config`] - configuration from the environment or a TOML file
//! - [`controller`] - connection lifecycle, callbacks and reconnect policy
//! - [`transport`] - the protocol engine seam and its rumqttc implementation
//! - [`observability`] - tracing set-up
//!
//! # Quick Start
//!
//! ```rust
//! use bms_listener::config::ClientConfig;
//! use bms_listener::controller::MqttController;
//! use bms_listener::transport::mqtt::ConnectionState;
//!
//! let config = ClientConfig {
//!     topic: "Rubicon/BMS/+/Raw".to_string(),
//!     ..ClientConfig::from_lookup(|_| None)
//! }
//! .with_generated_client_id(9)
//! .unwrap();
//!
//! assert!(config.client_id.starts_with("BMS-Client-"));
//! assert!(config.validate().is_ok());
//!
//! let controller = MqttController::new(config);
//! assert_eq!(controller.state(), ConnectionState::Disconnected);
//! // controller.connect().await blocks until Ctrl-C
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod id_generator;
pub mod observability;
pub mod testing;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use controller::{LifecycleHandler, MqttController, SessionOutcome};
pub use error::{ClientError, ClientResult};
pub use id_generator::{generate_client_id, generate_id, IdGeneratorError};
pub use transport::mqtt::ConnectionState;
