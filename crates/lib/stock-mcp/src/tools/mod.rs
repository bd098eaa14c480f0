//! MCP tool modules.
//!
//! Data tools are generated from the registry and forward raw arguments to
//! the dispatcher; contextual help is hand-written.

mod context;
pub(crate) mod data;
