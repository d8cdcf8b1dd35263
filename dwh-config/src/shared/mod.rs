mod loader;
mod warehouse;

pub use loader::*;
pub use warehouse::*;
