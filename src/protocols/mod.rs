//! Protocol layer - boundaries between the deploy client and its collaborators.
//!
//! This module provides:
//! - `NativeDeploy` trait: client → native update plugin boundary
//! - `DeployHost` / `SettingsStore` traits: client → host application boundary
//! - `signal`: mapping of native result payloads to typed stage signals
//!
//! Key design principle: the protocol layer holds no client state (channel,
//! watch handle). Those live in `runtime::deploy::Deploy`.

pub mod host;
pub mod native;
pub mod signal;

pub use host::{DeployHost, SettingsStore};
pub use native::NativeDeploy;
