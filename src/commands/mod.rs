//! Tauri command handlers organized by domain.
//!
//! Each submodule contains related commands and their helper functions.

pub mod deploy;
