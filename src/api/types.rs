//! Bridge types for commands and events.
//!
//! These types provide a stable API surface for the frontend and for host
//! code embedding the deploy client, hiding native payload details.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use specta::Type;

/// Unique identifier for a progress-reporting operation (UUID v4 string)
pub type OperationId = String;

/// Informational record about the currently deployed version.
///
/// Passed through from the native plugin unmodified.
pub type DeployInfo = serde_json::Value;

/// Channel checked when none has been configured
pub const DEFAULT_CHANNEL: &str = "production";

/// Delay before the first watch check (milliseconds)
pub const DEFAULT_INITIAL_DELAY_MS: u32 = 5 * 1000;

/// Delay between watch checks (milliseconds)
pub const DEFAULT_WATCH_INTERVAL_MS: u32 = 60 * 1000;

/// Options accepted by `Deploy::watch`.
///
/// Missing fields fall back to the defaults; unknown fields are ignored.
/// Milliseconds are `u32` so they map to a plain JavaScript number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct WatchOptions {
    /// Delay before the first check (milliseconds)
    pub initial_delay: Option<u32>,
    /// Delay between consecutive checks (milliseconds)
    pub interval: Option<u32>,
}

impl WatchOptions {
    pub fn new(initial_delay_ms: u32, interval_ms: u32) -> Self {
        Self {
            initial_delay: Some(initial_delay_ms),
            interval: Some(interval_ms),
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY_MS).into())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval.unwrap_or(DEFAULT_WATCH_INTERVAL_MS).into())
    }
}

/// Plugin configuration read from the `plugins.deploy` section of the host config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Application identifier passed to every native call
    pub app_id: Option<String>,
    /// Initial update channel (defaults to "production")
    pub channel: Option<String>,
    /// Upper bound for each stage of `update` (milliseconds), none when unset or zero
    pub stage_timeout_ms: Option<u32>,
    /// Watch options used by the `deploy_watch` command when none are given
    pub watch: Option<WatchOptions>,
}

impl DeployConfig {
    pub fn channel(&self) -> String {
        self.channel
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string())
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms.into()))
    }
}

/// Pipeline stage, used to tag progress events and timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub enum DeployStage {
    Check,
    Download,
    Extract,
    Update,
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeployStage::Check => "check",
            DeployStage::Download => "download",
            DeployStage::Extract => "extract",
            DeployStage::Update => "update",
        };
        f.write_str(name)
    }
}

/// Payload for `deploy/progress` events
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct DeployProgressEvent {
    /// Operation this progress belongs to
    pub operation_id: OperationId,
    /// Stage reporting progress
    pub stage: DeployStage,
    /// Progress value, 0-100 for `update`, plugin-native units otherwise
    pub progress: f64,
}

/// Payload for `deploy/watch_result` events
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
#[serde(rename_all = "camelCase")]
pub struct WatchResultEvent {
    /// Whether the last check found an update
    pub update_available: bool,
}

/// Events announced on the host event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployEvent {
    /// The host finished initializing (emitted once)
    Ready,
    /// A watch check found an update
    UpdateAvailable,
    /// Result of a completed watch check
    WatchResult { update_available: bool },
    /// Progress of a command-driven operation
    Progress {
        operation_id: OperationId,
        stage: DeployStage,
        progress: f64,
    },
}

/// API errors for frontend consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Type)]
#[serde(tag = "type")]
pub enum ApiError {
    /// The native deploy plugin is not installed or has not loaded
    PluginUnavailable,
    /// The native plugin reported an error; the payload is passed through unmodified
    Native { message: String },
    /// No app id is configured in the settings store
    MissingAppId,
    /// A stage did not settle in time
    Timeout { stage: DeployStage },
    /// The operation was dropped without ever settling
    Abandoned,
    /// Invalid input parameter
    InvalidInput { message: String },
}

impl ApiError {
    pub fn native(message: impl Into<String>) -> Self {
        ApiError::Native {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::PluginUnavailable => write!(f, "IONIC_DEPLOY_MISSING_PLUGIN"),
            ApiError::Native { message } => write!(f, "{message}"),
            ApiError::MissingAppId => write!(f, "No app id configured"),
            ApiError::Timeout { stage } => write!(f, "Deploy {stage} timed out"),
            ApiError::Abandoned => write!(f, "Operation was abandoned before settling"),
            ApiError::InvalidInput { message } => write!(f, "Invalid input: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}
