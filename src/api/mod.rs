//! API types for frontend-backend bridge.
//!
//! This module defines stable types for Tauri commands and events,
//! isolating native plugin payloads from the frontend.

pub mod types;
