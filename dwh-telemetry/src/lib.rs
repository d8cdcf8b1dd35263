//! Telemetry initialization for warehouse loader services.

pub mod tracing;
