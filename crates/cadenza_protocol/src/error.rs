//! Structured error raised by the host process.
//!
//! This is what a well-behaved host puts on the wire. Receivers must not rely
//! on it: older hosts send bare strings or `{short, message}` objects.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Category of a host failure. Serialised as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostErrorType {
    Io,
    Descriptive,
    Conversion,
    Task,
    Database,
    Bridge,
    Serde,
    Decoder,
}

/// Context is either one (possibly multi-line) string or a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostErrorContext {
    Line(String),
    Lines(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}{}", render_context(.context))]
pub struct HostError {
    #[serde(rename = "type")]
    pub kind: HostErrorType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HostErrorContext>,
}

fn render_context(context: &Option<HostErrorContext>) -> String {
    match context {
        None => String::new(),
        Some(HostErrorContext::Line(line)) => format!(" [Context: {}]", line),
        Some(HostErrorContext::Lines(lines)) => format!(" [Context: {}]", lines.join("; ")),
    }
}

impl HostError {
    pub fn new(kind: HostErrorType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// A business-level error whose message is meant for the user as-is.
    pub fn descriptive(message: impl Into<String>) -> Self {
        Self::new(HostErrorType::Descriptive, message)
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(HostErrorContext::Line(context.into()));
        self
    }

    /// Append one line of context, creating the context if there is none.
    pub fn append_context(mut self, line: &str) -> Self {
        self.context = Some(match self.context.take() {
            None => HostErrorContext::Line(line.to_string()),
            Some(HostErrorContext::Line(mut existing)) => {
                if !existing.is_empty() {
                    existing.push('\n');
                }
                existing.push_str(line);
                HostErrorContext::Line(existing)
            }
            Some(HostErrorContext::Lines(mut lines)) => {
                lines.push(line.to_string());
                HostErrorContext::Lines(lines)
            }
        });
        self
    }

    /// Serialise for the wire. Serialising this struct cannot fail.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::String(self.to_string()))
    }
}

impl From<io::Error> for HostError {
    fn from(value: io::Error) -> Self {
        let message = match value.kind() {
            io::ErrorKind::NotFound => "IO: Not found",
            io::ErrorKind::AlreadyExists => "IO: Already exists",
            io::ErrorKind::UnexpectedEof => "IO: Unexpected end of file",
            io::ErrorKind::PermissionDenied => "IO: Permission denied",
            _ => "IO: Unhandled error",
        };

        Self::new(HostErrorType::Io, message).with_context(value.to_string())
    }
}

impl From<serde_json::Error> for HostError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(HostErrorType::Serde, "Serde: JSON serialization error")
            .with_context(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_context_creates_then_extends() {
        let err = HostError::descriptive("boom")
            .append_context("first")
            .append_context("second");
        assert_eq!(
            err.context,
            Some(HostErrorContext::Line("first\nsecond".to_string()))
        );
    }

    #[test]
    fn test_io_error_keeps_os_text_as_context() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such dir");
        let err = HostError::from(io_err);
        assert_eq!(err.kind, HostErrorType::Io);
        assert_eq!(err.message, "IO: Not found");
        assert_eq!(err.context, Some(HostErrorContext::Line("no such dir".into())));
    }

    #[test]
    fn test_display_includes_context() {
        let err = HostError::descriptive("disk full").with_context("while writing");
        assert_eq!(err.to_string(), "disk full [Context: while writing]");
        assert_eq!(HostError::descriptive("plain").to_string(), "plain");
    }

    #[test]
    fn test_wire_shape() {
        let value = HostError::descriptive("bad").to_value();
        assert_eq!(value, serde_json::json!({"type": "descriptive", "message": "bad"}));
    }
}
