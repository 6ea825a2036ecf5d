//! Error types for the onboarding SDK.

use serde::{Deserialize, Serialize};

/// Machine-readable error taxonomy shared by the client, loader and query layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidAppId,
    NotFound,
    NetworkError,
    Timeout,
    ServerError,
    Unknown,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidAppId => "INVALID_APP_ID",
            Self::NotFound => "NOT_FOUND",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ServerError => "SERVER_ERROR",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// A tagged onboarding failure, as carried in `OnboardingResponse::error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct OnboardingError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OnboardingError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_app_id() -> Self {
        Self::new(ErrorCode::InvalidAppId, "App ID must be a non-empty string")
    }
}

/// Environment / configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by a running flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("No onboarding screens available")]
    NoScreens,

    #[error("Flow already finished")]
    AlreadyFinished,

    #[error("Element {element_id} not found on screen {screen_id}")]
    ElementNotFound {
        screen_id: String,
        element_id: String,
    },

    #[error("Element {element_id} does not accept {operation}")]
    UnsupportedOperation {
        element_id: String,
        operation: String,
    },
}

/// Persistent store / cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid expiry for {key}: {value}")]
    InvalidExpiry { key: String, value: String },
}

/// Errors from executing an `api` action.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::InvalidAppId).unwrap();
        assert_eq!(json, "\"INVALID_APP_ID\"");
        let code: ErrorCode = serde_json::from_str("\"NETWORK_ERROR\"").unwrap();
        assert_eq!(code, ErrorCode::NetworkError);
    }

    #[test]
    fn error_code_display_matches_wire_name() {
        assert_eq!(ErrorCode::ServerError.to_string(), "SERVER_ERROR");
        assert_eq!(ErrorCode::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn onboarding_error_display() {
        let err = OnboardingError::new(ErrorCode::NotFound, "missing");
        assert_eq!(err.to_string(), "NOT_FOUND: missing");
    }

    #[test]
    fn details_are_skipped_when_absent() {
        let err = OnboardingError::invalid_app_id();
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("details").is_none());
        assert_eq!(json["code"], "INVALID_APP_ID");
    }
}
