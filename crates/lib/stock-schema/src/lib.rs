//! Stable output schema for stock-mcp.
//!
//! This crate defines the tool request/result envelope and the normalized
//! payload models shared by the router, the MCP surface, and the HTTP API.

pub mod models;
pub mod schema;

pub use models::*;
