//! Warehouse stores.
//!
//! The downstream persistence collaborator durably stores emitted rows and
//! asynchronously deduplicates them by a declared latest-version-wins rule.
//! The engine only provides correct inputs to that mechanism: dimension tables
//! keep full version history (rows are never deleted, closing a version means
//! re-emitting it with its window set), and fact tables receive one row per
//! emission.

mod base;
pub mod memory;
pub mod ndjson;

pub use base::*;
