//! Typed errors for everything that crosses the host boundary.
//!
//! The host may report failures in any shape: a bare string, a structured
//! [`HostError`], a legacy `{short, message}` object, or something else
//! entirely. [`TypedError::from_raw`] is the single, total normalisation point.

use cadenza_protocol::defaults::CANCELLED_BY_USER_MESSAGE;
use cadenza_protocol::{HostError, HostErrorContext, HostErrorType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Origin or category of a failure. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    Serialization,
    Conversion,
    Task,
    Database,
    Bridge,
    Decoder,
    /// Business error whose message is meant for the user as-is
    Descriptive,
    Cancelled,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Conversion => "conversion",
            ErrorKind::Task => "task",
            ErrorKind::Database => "database",
            ErrorKind::Bridge => "bridge",
            ErrorKind::Decoder => "decoder",
            ErrorKind::Descriptive => "descriptive",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Map a host-reported type tag. Accepts current and legacy host names.
    fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag.to_ascii_lowercase().as_str() {
            "io" => ErrorKind::Io,
            "serde" | "serialization" => ErrorKind::Serialization,
            "conversion" => ErrorKind::Conversion,
            "task" | "tokio" => ErrorKind::Task,
            "database" => ErrorKind::Database,
            "bridge" | "tauri" => ErrorKind::Bridge,
            "decoder" | "symphonia" | "encoder" => ErrorKind::Decoder,
            "descriptive" => ErrorKind::Descriptive,
            "cancelled" => ErrorKind::Cancelled,
            "unknown" => ErrorKind::Unknown,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<HostErrorType> for ErrorKind {
    fn from(value: HostErrorType) -> Self {
        match value {
            HostErrorType::Io => ErrorKind::Io,
            HostErrorType::Descriptive => ErrorKind::Descriptive,
            HostErrorType::Conversion => ErrorKind::Conversion,
            HostErrorType::Task => ErrorKind::Task,
            HostErrorType::Database => ErrorKind::Database,
            HostErrorType::Bridge => ErrorKind::Bridge,
            HostErrorType::Serde => ErrorKind::Serialization,
            HostErrorType::Decoder => ErrorKind::Decoder,
        }
    }
}

/// Optional multi-line context. Use [`TypedError::context_lines`] to read it;
/// callers never need to distinguish the two storage forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorContext {
    Line(String),
    Lines(Vec<String>),
}

impl From<HostErrorContext> for ErrorContext {
    fn from(value: HostErrorContext) -> Self {
        match value {
            HostErrorContext::Line(line) => ErrorContext::Line(line),
            HostErrorContext::Lines(lines) => ErrorContext::Lines(lines),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TypedError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
}

impl TypedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    pub fn descriptive(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Descriptive, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, CANCELLED_BY_USER_MESSAGE)
    }

    pub fn with_context(mut self, context: impl Into<ErrorContext>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Normalise an arbitrary host failure value. Never panics.
    pub fn from_raw(raw: &Value) -> Self {
        match raw {
            Value::String(message) => Self::descriptive(message.clone()),
            Value::Object(fields) => Self::from_object(fields),
            Value::Null => Self::new(ErrorKind::Unknown, "unknown error"),
            other => Self::new(ErrorKind::Unknown, other.to_string()),
        }
    }

    fn from_object(fields: &Map<String, Value>) -> Self {
        let tag = fields
            .get("type")
            .or_else(|| fields.get("kind"))
            .and_then(Value::as_str);

        // Legacy hosts put the headline in `short` and the detail in `message`.
        let (message, legacy_detail) = match (fields.get("short"), fields.get("message")) {
            (Some(Value::String(short)), detail) => (Some(short.clone()), detail),
            (_, Some(Value::String(message))) => (Some(message.clone()), None),
            _ => (None, None),
        };

        let Some(message) = message else {
            return Self::new(ErrorKind::Unknown, Value::Object(fields.clone()).to_string());
        };

        let kind = tag
            .and_then(ErrorKind::from_tag)
            .unwrap_or(if tag.is_some() {
                ErrorKind::Unknown
            } else {
                ErrorKind::Descriptive
            });

        let context = fields
            .get("context")
            .or(legacy_detail)
            .and_then(context_from_value);

        Self {
            kind,
            message,
            context,
        }
    }

    /// Context as an ordered list of lines, whatever form it was stored in.
    pub fn context_lines(&self) -> Vec<String> {
        match &self.context {
            None => Vec::new(),
            Some(ErrorContext::Line(text)) => text.lines().map(str::to_string).collect(),
            Some(ErrorContext::Lines(lines)) => lines.clone(),
        }
    }
}

fn context_from_value(value: &Value) -> Option<ErrorContext> {
    match value {
        Value::String(text) => Some(ErrorContext::Line(text.clone())),
        Value::Array(items) => Some(ErrorContext::Lines(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )),
        Value::Null => None,
        other => Some(ErrorContext::Line(other.to_string())),
    }
}

impl From<HostError> for TypedError {
    fn from(value: HostError) -> Self {
        Self {
            kind: value.kind.into(),
            message: value.message,
            context: value.context.map(ErrorContext::from),
        }
    }
}

impl From<String> for ErrorContext {
    fn from(value: String) -> Self {
        ErrorContext::Line(value)
    }
}

impl From<&str> for ErrorContext {
    fn from(value: &str) -> Self {
        ErrorContext::Line(value.to_string())
    }
}

impl From<Vec<String>> for ErrorContext {
    fn from(value: Vec<String>) -> Self {
        ErrorContext::Lines(value)
    }
}

/// The caller did not provide what a scan needs. Raised before any job
/// starts; retrying cannot fix it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("No library name was provided")]
    MissingName,

    #[error("No scan locations were provided")]
    MissingScanLocations,

    #[error("Scan location #{index} is blank")]
    BlankScanLocation { index: usize },
}
