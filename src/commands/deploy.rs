//! Deploy-related Tauri commands.
//!
//! These commands provide the frontend API for the update lifecycle.
//! Progress-bearing commands emit `deploy/progress` events tagged with a
//! fresh operation ID while they run and return the final outcome.

use std::sync::Arc;

use tauri::State;
use uuid::Uuid;

use crate::api::types::{
    ApiError, DeployEvent, DeployInfo, DeployStage, OperationId, WatchOptions,
};
use crate::runtime::deferred::Promise;
use crate::runtime::deploy::Deploy;

/// Initialize the native plugin for the configured app.
#[tauri::command]
#[specta::specta]
pub fn deploy_initialize(deploy: State<'_, Arc<Deploy>>) {
    log::debug!("deploy_initialize called");
    deploy.initialize();
}

/// Check the current channel for an update.
///
/// # Errors
///
/// Returns `ApiError::PluginUnavailable` if the native plugin is missing.
/// Returns `ApiError::Native` with the plugin's payload if the check fails.
#[tauri::command]
#[specta::specta]
pub async fn deploy_check(deploy: State<'_, Arc<Deploy>>) -> Result<bool, ApiError> {
    log::debug!("deploy_check called: channel={}", deploy.channel());
    deploy.check().await
}

/// Download the available update, emitting `deploy/progress` while it runs.
#[tauri::command]
#[specta::specta]
pub async fn deploy_download(deploy: State<'_, Arc<Deploy>>) -> Result<bool, ApiError> {
    let promise = deploy.download();
    let operation_id = forward_progress(deploy.inner(), &promise, DeployStage::Download);
    log::debug!("deploy_download started: operation_id={operation_id}");
    promise.await
}

/// Extract the downloaded update, emitting `deploy/progress` while it runs.
#[tauri::command]
#[specta::specta]
pub async fn deploy_extract(deploy: State<'_, Arc<Deploy>>) -> Result<String, ApiError> {
    let promise = deploy.extract();
    let operation_id = forward_progress(deploy.inner(), &promise, DeployStage::Extract);
    log::debug!("deploy_extract started: operation_id={operation_id}");
    promise.await
}

/// Reload the app into the latest extracted version.
#[tauri::command]
#[specta::specta]
pub fn deploy_load(deploy: State<'_, Arc<Deploy>>) {
    log::debug!("deploy_load called");
    deploy.load();
}

/// Information about the current deploy.
#[tauri::command]
#[specta::specta]
pub async fn deploy_info(deploy: State<'_, Arc<Deploy>>) -> Result<DeployInfo, ApiError> {
    deploy.info().await
}

/// Set the channel checked for updates.
///
/// # Errors
///
/// Returns `ApiError::InvalidInput` if the channel is empty.
#[tauri::command]
#[specta::specta]
pub fn deploy_set_channel(deploy: State<'_, Arc<Deploy>>, channel: String) -> Result<(), ApiError> {
    if channel.trim().is_empty() {
        return Err(ApiError::InvalidInput {
            message: "Channel cannot be empty".to_string(),
        });
    }
    deploy.set_channel(channel);
    Ok(())
}

/// Get the channel checked for updates.
#[tauri::command]
#[specta::specta]
pub fn deploy_get_channel(deploy: State<'_, Arc<Deploy>>) -> String {
    deploy.channel()
}

/// Start watching for updates.
///
/// Every completed check is emitted as `deploy/watch_result`; detected updates
/// are also emitted as `deploy/update_available`. Without options the
/// configured watch defaults are used.
#[tauri::command]
#[specta::specta]
pub async fn deploy_watch(
    deploy: State<'_, Arc<Deploy>>,
    options: Option<WatchOptions>,
) -> Result<(), ApiError> {
    let options = options.unwrap_or_else(|| deploy.watch_defaults());
    log::debug!("deploy_watch called: options={options:?}");

    // Use .inner() to get &Arc<Deploy> for the arbitrary self type receiver
    let promise = deploy.inner().watch(options);
    let host = Arc::clone(deploy.host());
    promise.then(
        |_| {},
        |e| log::debug!("Deploy watch ended: {e}"),
        move |update_available| host.emit(DeployEvent::WatchResult { update_available }),
    );

    Ok(())
}

/// Stop watching for updates.
#[tauri::command]
#[specta::specta]
pub fn deploy_unwatch(deploy: State<'_, Arc<Deploy>>) {
    log::debug!("deploy_unwatch called");
    deploy.unwatch();
}

/// Check, download, extract and load an update in one operation.
///
/// Emits combined 0-100 progress as `deploy/progress` with stage `update`.
/// Returns `false` when no update is available.
#[tauri::command]
#[specta::specta]
pub async fn deploy_update(deploy: State<'_, Arc<Deploy>>) -> Result<bool, ApiError> {
    let promise = deploy.inner().update();
    let operation_id = forward_progress(deploy.inner(), &promise, DeployStage::Update);
    log::info!("deploy_update started: operation_id={operation_id}");
    promise.await
}

/// Re-emit the progress of `promise` on the host bus under a new operation ID.
fn forward_progress<T>(deploy: &Arc<Deploy>, promise: &Promise<T>, stage: DeployStage) -> OperationId
where
    T: Clone + Send + Sync + 'static,
{
    let operation_id = Uuid::new_v4().to_string();
    let host = Arc::clone(deploy.host());
    let event_operation_id = operation_id.clone();

    promise.then(
        |_| {},
        |_| {},
        move |progress| {
            host.emit(DeployEvent::Progress {
                operation_id: event_operation_id.clone(),
                stage,
                progress,
            })
        },
    );

    operation_id
}
