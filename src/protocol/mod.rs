//! MCP protocol layer: method names and wire types

pub mod methods;
pub mod types;

pub use types::*;
