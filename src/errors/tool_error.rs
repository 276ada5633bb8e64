use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Config,
    InvalidParams,
    NotFound,
    Denied,
    Validation,
    Timeout,
    Upstream,
    Internal,
}

/// Uniform error value for everything past the transport boundary. Upstream
/// HTTP failures carry their status; transport failures do not.
#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            status: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Config, "CONFIG", message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidParams, "INVALID_PARAMS", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, "NOT_FOUND", message)
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Denied, "DENIED", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Validation, "UPSTREAM_VALIDATION", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, "TIMEOUT", message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Upstream, "UPSTREAM", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, "INTERNAL", message)
    }

    /// Classify a non-2xx upstream response into the error taxonomy.
    pub fn from_upstream_status(status: u16, message: impl Into<String>) -> Self {
        let err = match status {
            401 | 403 => Self::denied(message),
            404 => Self::not_found(message),
            422 => Self::validation(message),
            _ => Self::upstream(message),
        };
        err.with_status(status)
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ToolErrorKind::Validation || self.status == Some(422)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_maps_into_the_taxonomy() {
        assert_eq!(
            ToolError::from_upstream_status(404, "gone").kind,
            ToolErrorKind::NotFound
        );
        assert_eq!(
            ToolError::from_upstream_status(401, "no").kind,
            ToolErrorKind::Denied
        );
        assert_eq!(
            ToolError::from_upstream_status(422, "bad field").kind,
            ToolErrorKind::Validation
        );
        assert_eq!(
            ToolError::from_upstream_status(503, "down").kind,
            ToolErrorKind::Upstream
        );
    }

    #[test]
    fn upstream_status_is_preserved_on_the_error() {
        let err = ToolError::from_upstream_status(422, "bad field");
        assert_eq!(err.status, Some(422));
        assert!(err.is_validation());
        assert!(!ToolError::timeout("slow").is_validation());
    }
}
