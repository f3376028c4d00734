//! Runtime modules for the deploy client.
//!
//! The runtime domain handles the client state and the update lifecycle:
//! deferred operations, the lifecycle stages, the watch loop and the
//! all-in-one update.

pub mod deferred;
pub mod deploy;
pub mod settings;
#[cfg(feature = "tauri-host")]
pub mod tauri_host;
pub mod update;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;
