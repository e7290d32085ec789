//! Observability: structured logging set-up and span macros

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

pub use logging::mqtt_span;
