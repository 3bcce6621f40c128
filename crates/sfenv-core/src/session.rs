use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while decoding the session command's JSON output.
#[derive(Debug, Error)]
pub enum SessionParseError {
    #[error("session command did not emit valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session command reported status {status}: {message}")]
    ToolReported { status: i64, message: String },
    #[error("session command output has no `result` object")]
    MissingResult,
}

/// Session metadata for the authenticated org, in the order the tool emitted it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    fields: Vec<(String, String)>,
}

/// Envelope written by the `sf` CLI when `--json` is passed.
#[derive(Debug, Deserialize)]
struct CliEnvelope {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

impl CliEnvelope {
    fn failure_message(&self) -> String {
        match (&self.name, &self.message) {
            (Some(name), Some(message)) => format!("{name}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(name), None) => name.clone(),
            (None, None) => "no message".to_owned(),
        }
    }
}

impl SessionInfo {
    /// Decode raw command output of the form `{"result": {...}}`.
    pub fn from_cli_output(stdout: &str) -> Result<Self, SessionParseError> {
        let cleaned = strip_ansi(stdout);
        let envelope: CliEnvelope = serde_json::from_str(&cleaned)?;

        if let Some(status) = envelope.status.filter(|status| *status != 0) {
            return Err(SessionParseError::ToolReported {
                status,
                message: envelope.failure_message(),
            });
        }

        match envelope.result {
            Some(Value::Object(result)) => Ok(Self::from_result(&result)),
            _ => Err(SessionParseError::MissingResult),
        }
    }

    pub fn from_result(result: &Map<String, Value>) -> Self {
        let fields = result
            .iter()
            .map(|(key, value)| (key.clone(), value_to_string(value)))
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Extract the tool's own failure description from output it wrote alongside a
/// non-zero exit, if it wrote a JSON envelope at all.
pub fn reported_failure(stdout: &str) -> Option<String> {
    let envelope: CliEnvelope = serde_json::from_str(&strip_ansi(stdout)).ok()?;
    if envelope.message.is_none() && envelope.name.is_none() {
        return None;
    }
    Some(envelope.failure_message())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI pattern"))
}

/// Remove terminal colour sequences some CLI versions emit even in JSON mode.
pub fn strip_ansi(raw: &str) -> String {
    ansi_pattern().replace_all(raw, "").into_owned()
}
