//! Native plugin access.
//!
//! Resolves the native deploy plugin once and shares the handle with every
//! lifecycle operation of a `Deploy` client.

pub mod gateway;

pub use gateway::PluginGateway;
