//! Plugin Gateway - resolves and memoizes the native deploy plugin handle.
//!
//! The native plugin may load after the client is constructed, so a missing
//! plugin is re-probed on every call. Once found, the handle is cached for the
//! lifetime of the gateway and the resolver is never called again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::protocols::native::NativeDeploy;

/// Probe for the native plugin; `None` when it is not installed or not loaded.
pub type PluginResolver = Box<dyn Fn() -> Option<Arc<dyn NativeDeploy>> + Send + Sync>;

pub struct PluginGateway {
    /// Probe used until the plugin is found
    resolver: PluginResolver,
    /// Memoized plugin handle
    plugin: OnceLock<Arc<dyn NativeDeploy>>,
    /// Whether the missing-plugin diagnostic was already logged
    reported_missing: AtomicBool,
}

impl PluginGateway {
    /// Create a gateway that probes with `resolver`.
    pub fn new<F>(resolver: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn NativeDeploy>> + Send + Sync + 'static,
    {
        Self {
            resolver: Box::new(resolver),
            plugin: OnceLock::new(),
            reported_missing: AtomicBool::new(false),
        }
    }

    /// Create a gateway for a plugin that is already available.
    pub fn with_plugin(plugin: Arc<dyn NativeDeploy>) -> Self {
        let gateway = Self::new(|| None);
        let _ = gateway.plugin.set(plugin);
        gateway
    }

    /// Create a gateway that never finds a plugin.
    pub fn unavailable() -> Self {
        Self::new(|| None)
    }

    /// Get the native plugin, probing for it if it has not been found yet.
    pub fn plugin(&self) -> Option<Arc<dyn NativeDeploy>> {
        if let Some(plugin) = self.plugin.get() {
            return Some(Arc::clone(plugin));
        }

        match (self.resolver)() {
            Some(plugin) => {
                // Keep whichever handle won if another thread resolved concurrently
                let _ = self.plugin.set(plugin);
                log::debug!("Deploy plugin resolved");
                self.plugin.get().cloned()
            }
            None => {
                if !self.reported_missing.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "Deploy plugin is not installed or has not loaded; deploy operations will fail"
                    );
                }
                None
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.plugin().is_some()
    }
}

impl std::fmt::Debug for PluginGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginGateway")
            .field("resolved", &self.plugin.get().is_some())
            .finish()
    }
}
