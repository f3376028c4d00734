//! Deploy client - lifecycle operations over the native update plugin.
//!
//! `Deploy` owns all state shared between operations: the memoized plugin
//! handle, the channel tag, the active watch and readiness. It is created
//! once per application and shared as `Arc<Deploy>`.
//!
//! Each lifecycle operation is independently usable and returns a `Promise`.
//! Ordering of stages (check before download, download before extract,
//! extract before load) is the caller's responsibility unless `update` is
//! used; see `runtime::update`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;

use crate::api::types::{ApiError, DeployConfig, DeployEvent, DeployInfo, DeployStage, WatchOptions};
use crate::plugins::gateway::PluginGateway;
use crate::protocols::host::{DeployHost, SettingsStore};
use crate::protocols::native::{ErrorCallback, NativeDeploy, ResultCallback};
use crate::protocols::signal::{
    parse_check_result, parse_download_signal, parse_extract_signal, StageSignal,
    UnrecognizedPayload, EXTRACT_DONE,
};
use crate::runtime::deferred::{Deferred, Promise};
use crate::runtime::watch::WatchHandle;

/// Callback queued by `on_ready` until the host is ready.
pub type ReadyCallback = Box<dyn FnOnce(Arc<Deploy>) + Send + 'static>;

type SignalParser = fn(&Value) -> Result<StageSignal, UnrecognizedPayload>;

pub struct Deploy {
    /// Access to the native plugin
    gateway: PluginGateway,
    /// Source of the app id, read on every call
    settings: Arc<dyn SettingsStore>,
    /// Event bus for readiness and update announcements
    host: Arc<dyn DeployHost>,
    /// Update channel checked by `check`
    channel: RwLock<String>,
    /// Upper bound for each stage of `update`
    stage_timeout: Option<Duration>,
    /// Watch options used when a caller gives none
    watch_defaults: WatchOptions,
    /// Active watch loop, if any
    watch: Mutex<Option<WatchHandle>>,
    /// Whether `mark_ready` has run
    ready: AtomicBool,
    /// Callbacks waiting for `mark_ready`
    ready_callbacks: Mutex<Vec<ReadyCallback>>,
}

impl Deploy {
    /// Create a client with the default configuration.
    pub fn new(
        gateway: PluginGateway,
        settings: Arc<dyn SettingsStore>,
        host: Arc<dyn DeployHost>,
    ) -> Arc<Self> {
        Self::with_config(gateway, settings, host, &DeployConfig::default())
    }

    /// Create a client using the channel, timeout and watch defaults of `config`.
    pub fn with_config(
        gateway: PluginGateway,
        settings: Arc<dyn SettingsStore>,
        host: Arc<dyn DeployHost>,
        config: &DeployConfig,
    ) -> Arc<Self> {
        let channel = config.channel();
        log::info!("Deploy client created: channel={channel}");

        Arc::new(Self {
            gateway,
            settings,
            host,
            channel: RwLock::new(channel),
            stage_timeout: config.stage_timeout(),
            watch_defaults: config.watch.unwrap_or_default(),
            watch: Mutex::new(None),
            ready: AtomicBool::new(false),
            ready_callbacks: Mutex::new(Vec::new()),
        })
    }

    pub fn host(&self) -> &Arc<dyn DeployHost> {
        &self.host
    }

    pub fn gateway(&self) -> &PluginGateway {
        &self.gateway
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout
    }

    pub fn watch_defaults(&self) -> WatchOptions {
        self.watch_defaults
    }

    pub(crate) fn watch_slot(&self) -> MutexGuard<'_, Option<WatchHandle>> {
        self.watch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the plugin and app id for one native call.
    fn session(&self) -> Result<(Arc<dyn NativeDeploy>, String), ApiError> {
        let plugin = self.gateway.plugin().ok_or(ApiError::PluginUnavailable)?;
        let app_id = self.settings.app_id().ok_or(ApiError::MissingAppId)?;
        Ok((plugin, app_id))
    }

    /// Initialize the native plugin for the configured app.
    ///
    /// Fire-and-forget: nothing is reported back.
    pub fn initialize(&self) {
        match self.session() {
            Ok((plugin, app_id)) => {
                log::info!("Initializing deploy plugin: app_id={app_id}");
                plugin.initialize(&app_id);
            }
            Err(e) => log::warn!("Skipping deploy initialize: {e}"),
        }
    }

    /// Check the current channel for an update.
    ///
    /// Resolves `true` if an update is available, `false` otherwise.
    pub fn check(&self) -> Promise<bool> {
        let deferred = Deferred::new();
        let promise = deferred.promise();

        let (plugin, app_id) = match self.session() {
            Ok(session) => session,
            Err(e) => {
                deferred.reject(e);
                return promise;
            }
        };

        // Read at call time so set_channel applies to the next check
        let channel = self.channel();
        log::debug!("Checking for deploy updates: app_id={app_id}, channel={channel}");

        let on_result: ResultCallback = {
            let deferred = deferred.clone();
            Box::new(move |payload| {
                let available = parse_check_result(&payload);
                if available {
                    log::info!("Deploy update is available");
                } else {
                    log::info!("No deploy updates available");
                }
                deferred.resolve(available);
            })
        };
        let on_error = error_callback(deferred, DeployStage::Check);

        plugin.check(&app_id, &channel, on_result, on_error);
        promise
    }

    /// Download the available update.
    ///
    /// Progress values from the plugin are forwarded verbatim. Resolves the
    /// plugin's success flag.
    pub fn download(&self) -> Promise<bool> {
        let deferred = Deferred::new();
        let promise = deferred.promise();

        match self.session() {
            Ok((plugin, app_id)) => {
                log::debug!("Starting deploy download: app_id={app_id}");
                let (on_result, on_error) = stage_callbacks(
                    &deferred,
                    DeployStage::Download,
                    parse_download_signal,
                    |success| success,
                );
                plugin.download(&app_id, on_result, on_error);
            }
            Err(e) => {
                deferred.reject(e);
            }
        }

        promise
    }

    /// Extract the last downloaded update.
    ///
    /// Should be called after `download` resolves. Progress values are
    /// forwarded verbatim; resolves with the `"done"` marker.
    pub fn extract(&self) -> Promise<String> {
        let deferred = Deferred::new();
        let promise = deferred.promise();

        match self.session() {
            Ok((plugin, app_id)) => {
                log::debug!("Starting deploy extraction: app_id={app_id}");
                let (on_result, on_error) = stage_callbacks(
                    &deferred,
                    DeployStage::Extract,
                    parse_extract_signal,
                    |_| EXTRACT_DONE.to_string(),
                );
                plugin.extract(&app_id, on_result, on_error);
            }
            Err(e) => {
                deferred.reject(e);
            }
        }

        promise
    }

    /// Reload the app into the latest extracted version.
    ///
    /// Only needed after a manual download and extract; the latest deploy is
    /// loaded automatically on app start.
    pub fn load(&self) {
        match self.session() {
            Ok((plugin, app_id)) => {
                log::info!("Redirecting to latest deploy: app_id={app_id}");
                plugin.redirect(&app_id);
            }
            Err(e) => log::warn!("Skipping deploy load: {e}"),
        }
    }

    /// Information about the current deploy, passed through from the plugin.
    pub fn info(&self) -> Promise<DeployInfo> {
        let deferred = Deferred::new();
        let promise = deferred.promise();

        let (plugin, app_id) = match self.session() {
            Ok(session) => session,
            Err(e) => {
                deferred.reject(e);
                return promise;
            }
        };

        let on_result: ResultCallback = {
            let deferred = deferred.clone();
            Box::new(move |record| {
                deferred.resolve(record);
            })
        };
        let on_error: ErrorCallback = Box::new(move |error| {
            log::warn!("Deploy info failed: {error}");
            deferred.reject(ApiError::native(error));
        });

        plugin.info(&app_id, on_result, on_error);
        promise
    }

    /// Set the channel checked for updates. Applies from the next `check`.
    pub fn set_channel(&self, channel: impl Into<String>) {
        let channel = channel.into();
        log::info!("Deploy channel set: channel={channel}");
        *self.channel.write().unwrap_or_else(PoisonError::into_inner) = channel;
    }

    pub fn channel(&self) -> String {
        self.channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mark the host as ready.
    ///
    /// The first call emits `DeployEvent::Ready` and runs queued `on_ready`
    /// callbacks; later calls do nothing.
    pub fn mark_ready(self: &Arc<Self>) {
        let callbacks = {
            let mut pending = self.lock_ready_callbacks();
            if self.ready.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *pending)
        };

        log::info!("Deploy ready: queued_callbacks={}", callbacks.len());
        self.host.emit(DeployEvent::Ready);

        for callback in callbacks {
            callback(Arc::clone(self));
        }
    }

    /// Run `callback` once the host is ready, immediately if it already is.
    pub fn on_ready<F>(self: &Arc<Self>, callback: F)
    where
        F: FnOnce(Arc<Deploy>) + Send + 'static,
    {
        {
            let mut pending = self.lock_ready_callbacks();
            if !self.ready.load(Ordering::SeqCst) {
                pending.push(Box::new(callback));
                return;
            }
        }
        callback(Arc::clone(self));
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn lock_ready_callbacks(&self) -> MutexGuard<'_, Vec<ReadyCallback>> {
        self.ready_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Deploy {
    fn drop(&mut self) {
        if let Some(handle) = self.watch_slot().take() {
            handle.cancel();
        }
    }
}

/// Callbacks for a stage whose result callback mixes progress and a terminal marker.
fn stage_callbacks<T, F>(
    deferred: &Deferred<T>,
    stage: DeployStage,
    parse: SignalParser,
    complete: F,
) -> (ResultCallback, ErrorCallback)
where
    T: Clone + Send + Sync + 'static,
    F: Fn(bool) -> T + Send + Sync + 'static,
{
    let result_deferred = deferred.clone();
    let on_result: ResultCallback = Box::new(move |payload| match parse(&payload) {
        Ok(StageSignal::Progress(progress)) => {
            log::trace!("Deploy {stage} progress: {progress}");
            result_deferred.notify(progress);
        }
        Ok(StageSignal::Complete(success)) => {
            log::info!("Deploy {stage} complete: success={success}");
            result_deferred.resolve(complete(success));
        }
        Err(e) => log::warn!("Ignoring deploy {stage} result: {e}"),
    });

    (on_result, error_callback(deferred.clone(), stage))
}

fn error_callback<T>(deferred: Deferred<T>, stage: DeployStage) -> ErrorCallback
where
    T: Clone + Send + Sync + 'static,
{
    Box::new(move |error| {
        log::warn!("Deploy {stage} failed: {error}");
        deferred.reject(ApiError::native(error));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::host::APP_ID_KEY;
    use crate::runtime::deferred::drain;
    use crate::runtime::settings::MemorySettings;
    use crate::runtime::testing::{
        deploy_with, deploy_without_plugin, err, ok, MockHost, MockNative, TEST_APP_ID,
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_operations_reject_without_plugin() {
        let (deploy, _host) = deploy_without_plugin();

        let check = deploy.check();
        let download = deploy.download();
        let extract = deploy.extract();
        let info = deploy.info();

        // Rejected before returning
        assert!(check.is_settled());
        assert!(download.is_settled());
        assert!(extract.is_settled());
        assert!(info.is_settled());

        assert_eq!(check.await, Err(ApiError::PluginUnavailable));
        assert_eq!(download.await, Err(ApiError::PluginUnavailable));
        assert_eq!(extract.await, Err(ApiError::PluginUnavailable));
        assert_eq!(info.await, Err(ApiError::PluginUnavailable));

        // Fire-and-forget operations are skipped without panicking
        deploy.initialize();
        deploy.load();
    }

    #[tokio::test]
    async fn test_missing_app_id_rejects_without_native_call() {
        let native = MockNative::new();
        let deploy = Deploy::new(
            PluginGateway::with_plugin(Arc::clone(&native) as Arc<dyn NativeDeploy>),
            Arc::new(MemorySettings::new()),
            Arc::new(MockHost::default()),
        );

        assert_eq!(deploy.check().await, Err(ApiError::MissingAppId));
        deploy.load();
        assert_eq!(native.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_app_id_is_read_on_every_call() {
        let native = MockNative::new();
        native.script("check", vec![ok("false")]);
        let settings = Arc::new(MemorySettings::new());
        let deploy = Deploy::new(
            PluginGateway::with_plugin(Arc::clone(&native) as Arc<dyn NativeDeploy>),
            Arc::clone(&settings) as Arc<dyn SettingsStore>,
            Arc::new(MockHost::default()),
        );

        assert_eq!(deploy.check().await, Err(ApiError::MissingAppId));

        settings.set(APP_ID_KEY, "late-app");
        assert_eq!(deploy.check().await, Ok(false));
        assert_eq!(native.calls()[0].app_id, "late-app");
    }

    #[tokio::test]
    async fn test_check_resolves_availability() {
        let native = MockNative::new();
        let (deploy, _host) = deploy_with(&native);

        native.script("check", vec![ok("true")]);
        assert_eq!(deploy.check().await, Ok(true));

        native.script("check", vec![ok("false")]);
        assert_eq!(deploy.check().await, Ok(false));

        native.script("check", vec![ok("maybe")]);
        assert_eq!(deploy.check().await, Ok(false));
    }

    #[tokio::test]
    async fn test_check_uses_current_channel() {
        let native = MockNative::new();
        native.script("check", vec![ok("false")]);
        let (deploy, _host) = deploy_with(&native);

        assert_eq!(deploy.channel(), "production");
        deploy.check().await.unwrap();

        deploy.set_channel("staging");
        deploy.check().await.unwrap();

        let channels: Vec<_> = native
            .calls()
            .into_iter()
            .map(|call| call.channel.unwrap())
            .collect();
        assert_eq!(channels, vec!["production", "staging"]);
    }

    #[tokio::test]
    async fn test_check_error_is_passed_through() {
        let native = MockNative::new();
        native.script("check", vec![err("server unreachable")]);
        let (deploy, _host) = deploy_with(&native);

        assert_eq!(
            deploy.check().await,
            Err(ApiError::native("server unreachable"))
        );
    }

    #[tokio::test]
    async fn test_download_forwards_progress_and_resolves() {
        let native = MockNative::new();
        native.script("download", vec![ok(10), ok("55.5"), ok("true")]);
        let (deploy, _host) = deploy_with(&native);

        let promise = deploy.download();
        let mut progress = promise.progress();

        assert_eq!(promise.await, Ok(true));
        assert_eq!(drain(&mut progress), vec![10.0, 55.5]);
    }

    #[tokio::test]
    async fn test_download_false_marker_resolves_false() {
        let native = MockNative::new();
        native.script("download", vec![ok("false")]);
        let (deploy, _host) = deploy_with(&native);

        assert_eq!(deploy.download().await, Ok(false));
    }

    #[tokio::test]
    async fn test_download_ignores_unrecognized_payloads() {
        let native = MockNative::new();
        native.script("download", vec![ok("warming up"), ok(30), ok("true")]);
        let (deploy, _host) = deploy_with(&native);

        let promise = deploy.download();
        let mut progress = promise.progress();

        assert_eq!(promise.await, Ok(true));
        assert_eq!(drain(&mut progress), vec![30.0]);
    }

    #[tokio::test]
    async fn test_extract_resolves_done_marker() {
        let native = MockNative::new();
        native.script("extract", vec![ok(25), ok(90), ok("done")]);
        let (deploy, _host) = deploy_with(&native);

        let promise = deploy.extract();
        let mut progress = promise.progress();

        assert_eq!(promise.await, Ok("done".to_string()));
        assert_eq!(drain(&mut progress), vec![25.0, 90.0]);
    }

    #[tokio::test]
    async fn test_extract_error_is_passed_through() {
        let native = MockNative::new();
        native.script("extract", vec![ok(10), err("corrupt archive")]);
        let (deploy, _host) = deploy_with(&native);

        assert_eq!(
            deploy.extract().await,
            Err(ApiError::native("corrupt archive"))
        );
    }

    #[tokio::test]
    async fn test_info_passes_record_through() {
        let record = json!({"deploy_uuid": "abc-123", "binary_version": "1.0.2"});
        let native = MockNative::new();
        native.script("info", vec![ok(record.clone())]);
        let (deploy, _host) = deploy_with(&native);

        assert_eq!(deploy.info().await, Ok(record));
    }

    #[tokio::test]
    async fn test_info_error_is_passed_through() {
        let native = MockNative::new();
        native.script("info", vec![err("no deploy installed")]);
        let (deploy, _host) = deploy_with(&native);

        assert_eq!(
            deploy.info().await,
            Err(ApiError::native("no deploy installed"))
        );
    }

    #[tokio::test]
    async fn test_initialize_and_load_call_native() {
        let native = MockNative::new();
        let (deploy, _host) = deploy_with(&native);

        deploy.initialize();
        deploy.load();

        let ops: Vec<_> = native.calls().iter().map(|call| call.op).collect();
        assert_eq!(ops, vec!["initialize", "redirect"]);
        assert!(native.calls().iter().all(|call| call.app_id == TEST_APP_ID));
    }

    #[tokio::test]
    async fn test_config_sets_initial_channel() {
        let config = DeployConfig {
            channel: Some("beta".to_string()),
            ..Default::default()
        };
        let deploy = Deploy::with_config(
            PluginGateway::unavailable(),
            Arc::new(MemorySettings::new()),
            Arc::new(MockHost::default()),
            &config,
        );

        assert_eq!(deploy.channel(), "beta");
    }

    #[tokio::test]
    async fn test_mark_ready_emits_once_and_runs_callbacks() {
        let native = MockNative::new();
        let (deploy, host) = deploy_with(&native);
        let calls = Arc::new(Mutex::new(Vec::new()));

        let before = Arc::clone(&calls);
        deploy.on_ready(move |_| before.lock().unwrap().push("before"));
        assert!(!deploy.is_ready());
        assert!(calls.lock().unwrap().is_empty());

        deploy.mark_ready();
        deploy.mark_ready();

        let after = Arc::clone(&calls);
        deploy.on_ready(move |_| after.lock().unwrap().push("after"));

        assert!(deploy.is_ready());
        assert_eq!(*calls.lock().unwrap(), vec!["before", "after"]);
        assert_eq!(host.count(&DeployEvent::Ready), 1);
    }
}
