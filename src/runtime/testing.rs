//! Test doubles for the native plugin and the host event bus.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::time::Instant;

use crate::api::types::DeployEvent;
use crate::plugins::gateway::PluginGateway;
use crate::protocols::host::DeployHost;
use crate::protocols::native::{ErrorCallback, NativeDeploy, ResultCallback};
use crate::runtime::deploy::Deploy;
use crate::runtime::settings::MemorySettings;

pub const TEST_APP_ID: &str = "test-app";

/// Scripted callback fired by `MockNative`.
#[derive(Debug, Clone)]
pub enum Reply {
    Result(Value),
    Error(String),
}

pub fn ok(payload: impl Into<Value>) -> Reply {
    Reply::Result(payload.into())
}

pub fn err(message: &str) -> Reply {
    Reply::Error(message.to_string())
}

#[derive(Debug, Clone)]
pub struct NativeCall {
    pub op: &'static str,
    pub app_id: String,
    pub channel: Option<String>,
    pub at: Instant,
}

/// Native plugin double.
///
/// Each operation replays its script synchronously on every call. Without a
/// script the callbacks are parked, so the operation never settles.
#[derive(Default)]
pub struct MockNative {
    scripts: Mutex<HashMap<&'static str, Vec<Reply>>>,
    calls: Mutex<Vec<NativeCall>>,
    parked: Mutex<Vec<(ResultCallback, ErrorCallback)>>,
}

impl MockNative {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, op: &'static str, replies: Vec<Reply>) {
        self.scripts.lock().unwrap().insert(op, replies);
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.op == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Fire every parked result callback with `payload`; returns how many fired.
    pub fn release_parked(&self, payload: Value) -> usize {
        let parked = std::mem::take(&mut *self.parked.lock().unwrap());
        for (on_result, _) in &parked {
            on_result(payload.clone());
        }
        parked.len()
    }

    fn record(&self, op: &'static str, app_id: &str, channel: Option<&str>) {
        self.calls.lock().unwrap().push(NativeCall {
            op,
            app_id: app_id.to_string(),
            channel: channel.map(str::to_string),
            at: Instant::now(),
        });
    }

    fn fire(&self, op: &'static str, on_result: ResultCallback, on_error: ErrorCallback) {
        let script = self.scripts.lock().unwrap().get(op).cloned();
        match script {
            Some(replies) => {
                for reply in replies {
                    match reply {
                        Reply::Result(payload) => on_result(payload),
                        Reply::Error(message) => on_error(message),
                    }
                }
            }
            None => self.parked.lock().unwrap().push((on_result, on_error)),
        }
    }
}

impl NativeDeploy for MockNative {
    fn initialize(&self, app_id: &str) {
        self.record("initialize", app_id, None);
    }

    fn check(&self, app_id: &str, channel: &str, on_result: ResultCallback, on_error: ErrorCallback) {
        self.record("check", app_id, Some(channel));
        self.fire("check", on_result, on_error);
    }

    fn download(&self, app_id: &str, on_result: ResultCallback, on_error: ErrorCallback) {
        self.record("download", app_id, None);
        self.fire("download", on_result, on_error);
    }

    fn extract(&self, app_id: &str, on_result: ResultCallback, on_error: ErrorCallback) {
        self.record("extract", app_id, None);
        self.fire("extract", on_result, on_error);
    }

    fn redirect(&self, app_id: &str) {
        self.record("redirect", app_id, None);
    }

    fn info(&self, app_id: &str, on_result: ResultCallback, on_error: ErrorCallback) {
        self.record("info", app_id, None);
        self.fire("info", on_result, on_error);
    }
}

/// Host double recording every emitted event.
#[derive(Default)]
pub struct MockHost {
    events: Mutex<Vec<DeployEvent>>,
}

impl MockHost {
    pub fn events(&self) -> Vec<DeployEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &DeployEvent) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

impl DeployHost for MockHost {
    fn emit(&self, event: DeployEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A client wired to `native` with the test app id configured.
pub fn deploy_with(native: &Arc<MockNative>) -> (Arc<Deploy>, Arc<MockHost>) {
    let host = Arc::new(MockHost::default());
    let deploy = Deploy::new(
        PluginGateway::with_plugin(Arc::clone(native) as Arc<dyn NativeDeploy>),
        Arc::new(MemorySettings::with_app_id(TEST_APP_ID)),
        Arc::clone(&host) as Arc<dyn DeployHost>,
    );
    (deploy, host)
}

/// A client whose native plugin is missing.
pub fn deploy_without_plugin() -> (Arc<Deploy>, Arc<MockHost>) {
    let host = Arc::new(MockHost::default());
    let deploy = Deploy::new(
        PluginGateway::unavailable(),
        Arc::new(MemorySettings::with_app_id(TEST_APP_ID)),
        Arc::clone(&host) as Arc<dyn DeployHost>,
    );
    (deploy, host)
}
