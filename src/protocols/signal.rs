//! Mapping of plugin-native result payloads to typed stage signals.
//!
//! The native plugin overloads one result callback with both progress
//! values and terminal string markers (`"true"`, `"false"`, `"done"`).

use serde_json::Value;

/// Marker sent by `extract` once extraction has finished
pub const EXTRACT_DONE: &str = "done";

/// A single result callback from a multi-step native stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageSignal {
    /// Intermediate progress in plugin-native units
    Progress(f64),
    /// Terminal marker with its success flag
    Complete(bool),
}

/// A payload that is neither a terminal marker nor a numeric progress value.
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedPayload(pub Value);

impl std::fmt::Display for UnrecognizedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unrecognized native payload: {}", self.0)
    }
}

/// Interpret a `check` result. Anything other than `"true"` means no update.
pub fn parse_check_result(payload: &Value) -> bool {
    match payload {
        Value::Bool(flag) => *flag,
        Value::String(s) => s == "true",
        _ => false,
    }
}

/// Interpret a `download` result: `"true"`/`"false"` terminate, numbers are progress.
pub fn parse_download_signal(payload: &Value) -> Result<StageSignal, UnrecognizedPayload> {
    match payload {
        Value::Bool(flag) => Ok(StageSignal::Complete(*flag)),
        Value::String(s) if s == "true" => Ok(StageSignal::Complete(true)),
        Value::String(s) if s == "false" => Ok(StageSignal::Complete(false)),
        other => parse_progress(other).map(StageSignal::Progress),
    }
}

/// Interpret an `extract` result: `"done"` terminates, numbers are progress.
pub fn parse_extract_signal(payload: &Value) -> Result<StageSignal, UnrecognizedPayload> {
    match payload {
        Value::String(s) if s == EXTRACT_DONE => Ok(StageSignal::Complete(true)),
        other => parse_progress(other).map(StageSignal::Progress),
    }
}

fn parse_progress(payload: &Value) -> Result<f64, UnrecognizedPayload> {
    let value = match payload {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| UnrecognizedPayload(payload.clone()))
}
