//! Over-the-air deploy client.
//!
//! Drives the native deploy plugin through the update lifecycle (check,
//! download, extract, load), polls for updates in the background and offers
//! an all-in-one update with combined progress.
//!
//! With the `tauri-host` feature (default) the client is registered as the
//! `deploy` Tauri plugin: commands are exposed to the frontend and lifecycle
//! events are emitted on the app's event bus.

pub mod api;
#[cfg(feature = "tauri-host")]
pub mod commands;
pub mod plugins;
pub mod protocols;
pub mod runtime;

pub use api::types::{ApiError, DeployConfig, DeployEvent, DeployStage, WatchOptions};
pub use plugins::gateway::PluginGateway;
pub use protocols::{DeployHost, NativeDeploy, SettingsStore};
pub use runtime::deferred::{Deferred, Promise};
pub use runtime::deploy::Deploy;
pub use runtime::settings::MemorySettings;

#[cfg(feature = "tauri-host")]
pub use tauri_plugin::{init, specta_builder, PLUGIN_NAME};

#[cfg(feature = "tauri-host")]
mod tauri_plugin {
    use std::sync::Arc;

    use tauri::plugin::{Builder, TauriPlugin};
    use tauri::{Manager, RunEvent, Wry};
    use tauri_specta::collect_commands;

    use crate::api::types::DeployConfig;
    use crate::commands::deploy::*;
    use crate::plugins::gateway::PluginGateway;
    use crate::protocols::native::NativeDeploy;
    use crate::runtime::deploy::Deploy;
    use crate::runtime::settings::MemorySettings;
    use crate::runtime::tauri_host::TauriDeployHost;

    /// Name the plugin is registered under
    pub const PLUGIN_NAME: &str = "deploy";

    /// Command set shared by the plugin and the TypeScript bindings export.
    pub fn specta_builder() -> tauri_specta::Builder<Wry> {
        tauri_specta::Builder::<Wry>::new()
            .plugin_name(PLUGIN_NAME)
            .commands(collect_commands![
                deploy_initialize,
                deploy_check,
                deploy_download,
                deploy_extract,
                deploy_load,
                deploy_info,
                deploy_set_channel,
                deploy_get_channel,
                deploy_watch,
                deploy_unwatch,
                deploy_update,
            ])
    }

    /// Build the deploy plugin.
    ///
    /// `resolver` probes for the native deploy plugin; it is called until it
    /// returns a handle. Plugin configuration is read from the `deploy` entry
    /// of the Tauri config; a missing entry means the defaults.
    pub fn init<F>(resolver: F) -> TauriPlugin<Wry, Option<DeployConfig>>
    where
        F: Fn() -> Option<Arc<dyn NativeDeploy>> + Send + Sync + 'static,
    {
        let builder = specta_builder();

        Builder::<Wry, Option<DeployConfig>>::new(PLUGIN_NAME)
            .invoke_handler(builder.invoke_handler())
            .setup(move |app, api| {
                let config = api.config().clone().unwrap_or_default();
                let settings = Arc::new(MemorySettings::from_config(&config));

                if config.app_id.is_none() {
                    log::warn!("Deploy plugin configured without an app id");
                }

                let deploy = Deploy::with_config(
                    PluginGateway::new(resolver),
                    settings.clone(),
                    Arc::new(TauriDeployHost::new(app.clone())),
                    &config,
                );

                app.manage(settings);
                app.manage(deploy);

                log::info!("Deploy plugin initialized");
                Ok(())
            })
            .on_event(|app, event| {
                if let RunEvent::Ready = event {
                    if let Some(deploy) = app.try_state::<Arc<Deploy>>() {
                        deploy.inner().mark_ready();
                    }
                }
            })
            .build()
    }
}
