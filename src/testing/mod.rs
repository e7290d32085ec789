//! Testing utilities and mock implementations
//!
//! This module provides a scripted protocol engine for testing the controller
//! without an MQTT broker.

pub mod mocks;

pub use mocks::*;
