//! Configuration loading and shared configuration types for the warehouse
//! loader.
//!
//! Configuration is hierarchical: a base file, an optional environment-specific
//! overlay, and `APP_`-prefixed environment variable overrides, merged in that
//! order.

pub mod environment;
pub mod load;
pub mod shared;
