//! Core services for stock-mcp.
//!
//! This crate owns the tool registry and dispatcher, the provider adapter
//! boundary (with the Yahoo Finance and in-memory providers), response
//! normalization into the stable schema, and the single-flight result cache.

pub mod cache;
pub mod clock;
pub mod errors;
pub mod normalize;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod router;
