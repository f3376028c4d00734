//! Host boundaries: the event bus and the settings store.
//!
//! The deploy client does not know how the host application delivers
//! events or stores configuration. The runtime layer (or a test) provides
//! implementations of these traits when constructing a `Deploy`.

use crate::api::types::DeployEvent;

/// Settings key holding the application identifier
pub const APP_ID_KEY: &str = "app_id";

/// Callback interface for announcing deploy events to unrelated listeners.
///
/// Emission is best-effort: implementations log delivery failures instead
/// of reporting them back to the deploy client.
pub trait DeployHost: Send + Sync {
    /// Broadcast an event on the host event bus.
    fn emit(&self, event: DeployEvent);
}

/// Read access to application settings.
///
/// Values are read on every call so that configuration set late is honored.
pub trait SettingsStore: Send + Sync {
    /// Look up a setting by key.
    fn get(&self, key: &str) -> Option<String>;

    /// The configured application identifier, if any.
    fn app_id(&self) -> Option<String> {
        self.get(APP_ID_KEY).filter(|id| !id.trim().is_empty())
    }
}

/// Host that drops every event. Useful when nothing listens.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl DeployHost for NoopHost {
    fn emit(&self, event: DeployEvent) {
        log::trace!("Dropping deploy event without host: {event:?}");
    }
}
