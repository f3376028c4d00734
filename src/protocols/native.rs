//! NativeDeploy trait: client → native plugin abstraction boundary.
//!
//! The native update plugin performs the actual network transfer and
//! filesystem extraction. It reports back through callbacks: a result
//! callback that may fire many times (progress, then a terminal marker)
//! and an error callback.

/// Callback receiving plugin-native result payloads.
pub type ResultCallback = Box<dyn Fn(serde_json::Value) + Send + Sync + 'static>;

/// Callback receiving the plugin-native error payload.
pub type ErrorCallback = Box<dyn Fn(String) + Send + Sync + 'static>;

/// Abstract interface for the native update plugin.
///
/// Implementations may invoke the callbacks synchronously from within the
/// call or later from any thread.
pub trait NativeDeploy: Send + Sync {
    /// Prepare the plugin for the given app. No result is reported.
    fn initialize(&self, app_id: &str);

    /// Check the channel for an update.
    ///
    /// `on_result` receives `"true"` or `"false"`.
    fn check(&self, app_id: &str, channel: &str, on_result: ResultCallback, on_error: ErrorCallback);

    /// Download the available update.
    ///
    /// `on_result` receives progress values, then `"true"` or `"false"`.
    fn download(&self, app_id: &str, on_result: ResultCallback, on_error: ErrorCallback);

    /// Extract the last downloaded update.
    ///
    /// `on_result` receives progress values, then `"done"`.
    fn extract(&self, app_id: &str, on_result: ResultCallback, on_error: ErrorCallback);

    /// Reload the app into the latest extracted version.
    fn redirect(&self, app_id: &str);

    /// Report key/value information about the current deploy.
    fn info(&self, app_id: &str, on_result: ResultCallback, on_error: ErrorCallback);
}
