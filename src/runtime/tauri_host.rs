//! TauriDeployHost - Tauri implementation of the DeployHost trait.
//!
//! Translates deploy events into Tauri events for the frontend and any other
//! listener on the app's event bus.

use tauri::{AppHandle, Emitter, Runtime};

use crate::api::types::{DeployEvent, DeployProgressEvent, WatchResultEvent};
use crate::protocols::host::DeployHost;

/// Event name emitted once the host finished initializing
pub const EVENT_DEPLOY_READY: &str = "deploy/ready";

/// Event name emitted when a watch check finds an update
pub const EVENT_UPDATE_AVAILABLE: &str = "deploy/update_available";

/// Event name for command-driven progress
pub const EVENT_DEPLOY_PROGRESS: &str = "deploy/progress";

/// Event name for every completed watch check
pub const EVENT_WATCH_RESULT: &str = "deploy/watch_result";

pub struct TauriDeployHost<R: Runtime> {
    /// Tauri application handle for emitting events
    app: AppHandle<R>,
}

impl<R: Runtime> TauriDeployHost<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> DeployHost for TauriDeployHost<R> {
    fn emit(&self, event: DeployEvent) {
        let result = match event {
            DeployEvent::Ready => self.app.emit(EVENT_DEPLOY_READY, ()),
            DeployEvent::UpdateAvailable => self.app.emit(EVENT_UPDATE_AVAILABLE, ()),
            DeployEvent::WatchResult { update_available } => self
                .app
                .emit(EVENT_WATCH_RESULT, WatchResultEvent { update_available }),
            DeployEvent::Progress {
                operation_id,
                stage,
                progress,
            } => self.app.emit(
                EVENT_DEPLOY_PROGRESS,
                DeployProgressEvent {
                    operation_id,
                    stage,
                    progress,
                },
            ),
        };

        if let Err(e) = result {
            log::error!("Failed to emit deploy event: {e}");
        }
    }
}
