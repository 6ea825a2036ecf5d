//! Low-level onboarding client for `GET {base}/api/onboarding/{appId}`.
//!
//! Never returns `Err`: every failure is folded into an
//! [`OnboardingResponse`] with a tagged [`OnboardingError`], so callers
//! branch on `success` explicitly.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{DEFAULT_CLIENT_BASE_URL, DEFAULT_TIMEOUT};
use crate::error::{ErrorCode, OnboardingError};
use crate::onboarding::model::OnboardingConfig;

/// Characters left unescaped in a path component (matches JS `encodeURIComponent`).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-escape an app id for use as a single URL path segment.
pub fn escape_app_id(app_id: &str) -> String {
    utf8_percent_encode(app_id, COMPONENT).to_string()
}

/// Empty or whitespace-only app ids are rejected before any network call.
pub fn validate_app_id(app_id: &str) -> Result<(), OnboardingError> {
    if app_id.trim().is_empty() {
        return Err(OnboardingError::invalid_app_id());
    }
    Ok(())
}

/// Response envelope: `{ success, data?, error? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<OnboardingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OnboardingError>,
}

impl OnboardingResponse {
    pub fn ok(data: OnboardingConfig) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: OnboardingError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// True only when `success` is set and data is present.
    pub fn is_success(&self) -> bool {
        self.success && self.data.is_some()
    }

    pub fn error_message(&self) -> &str {
        self.error
            .as_ref()
            .map(|e| e.message.as_str())
            .unwrap_or("Unknown error occurred")
    }

    pub fn into_result(self) -> Result<OnboardingConfig, OnboardingError> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(error),
            _ => Err(OnboardingError::new(
                ErrorCode::Unknown,
                "Unknown error occurred",
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CLIENT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct OnboardingClient {
    options: ClientOptions,
    client: reqwest::Client,
}

impl OnboardingClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            client: reqwest::Client::new(),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn endpoint(&self, app_id: &str) -> String {
        format!(
            "{}/api/onboarding/{}",
            self.options.base_url.trim_end_matches('/'),
            escape_app_id(app_id)
        )
    }

    /// Fetch onboarding data for `app_id`.
    pub async fn get_onboarding_data(&self, app_id: &str) -> OnboardingResponse {
        if let Err(e) = validate_app_id(app_id) {
            return OnboardingResponse::err(e);
        }

        let url = self.endpoint(app_id);
        tracing::debug!(app_id = %app_id, url = %url, "Fetching onboarding data");

        match self.request(app_id, &url).await {
            Ok(data) => {
                tracing::info!(app_id = %app_id, screens = data.screens.len(), "Onboarding data fetched");
                OnboardingResponse::ok(data)
            }
            Err(e) => {
                tracing::warn!(app_id = %app_id, code = %e.code, error = %e.message, "Onboarding fetch failed");
                OnboardingResponse::err(e)
            }
        }
    }

    async fn request(&self, app_id: &str, url: &str) -> Result<OnboardingConfig, OnboardingError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.options.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), app_id));
        }

        let body = response.text().await.map_err(|e| transport_error(&e))?;
        let envelope: Value = serde_json::from_str(&body).map_err(|_| {
            OnboardingError::new(ErrorCode::Unknown, "Invalid JSON response from server")
        })?;

        let data = match envelope.get("data") {
            Some(data) if envelope.get("success") == Some(&Value::Bool(true)) && !data.is_null() => {
                data.clone()
            }
            _ => {
                return Err(OnboardingError::new(
                    ErrorCode::Unknown,
                    "Invalid response format from server",
                ));
            }
        };

        parse_config(data, app_id)
    }
}

/// Validate `data.screens` and deserialize the document. A missing `appId`
/// is filled with the requested one.
pub(crate) fn parse_config(data: Value, app_id: &str) -> Result<OnboardingConfig, OnboardingError> {
    if !data.get("screens").is_some_and(Value::is_array) {
        return Err(OnboardingError::new(
            ErrorCode::Unknown,
            "Invalid data format from server",
        ));
    }
    let mut config: OnboardingConfig = serde_json::from_value(data).map_err(|e| {
        OnboardingError::new(ErrorCode::Unknown, "Invalid data format from server")
            .with_details(Value::String(e.to_string()))
    })?;
    if config.app_id.is_empty() {
        config.app_id = app_id.to_string();
    }
    Ok(config)
}

/// Map a non-2xx status to the error taxonomy.
pub fn status_error(status: u16, app_id: &str) -> OnboardingError {
    match status {
        404 => OnboardingError::new(
            ErrorCode::NotFound,
            format!("Onboarding data not found for app ID: {app_id}"),
        ),
        400 => OnboardingError::new(ErrorCode::InvalidAppId, format!("Invalid app ID: {app_id}")),
        500 => OnboardingError::new(ErrorCode::ServerError, "Internal server error"),
        other => OnboardingError::new(ErrorCode::ServerError, format!("HTTP error: {other}")),
    }
}

/// Map a reqwest failure to the error taxonomy.
pub fn transport_error(e: &reqwest::Error) -> OnboardingError {
    if e.is_timeout() {
        OnboardingError::new(ErrorCode::Timeout, "Request timeout")
    } else if e.is_connect() {
        OnboardingError::new(
            ErrorCode::NetworkError,
            "Network error - unable to connect to server",
        )
    } else if e.is_decode() {
        OnboardingError::new(ErrorCode::Unknown, "Invalid JSON response from server")
    } else {
        OnboardingError::new(ErrorCode::Unknown, format!("Unexpected error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_encode_uri_component() {
        assert_eq!(escape_app_id("jakir-board"), "jakir-board");
        assert_eq!(escape_app_id("a b/c?d"), "a%20b%2Fc%3Fd");
        assert_eq!(escape_app_id("it's(ok)!~*._"), "it's(ok)!~*._");
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = OnboardingClient::new(ClientOptions {
            base_url: "http://host:3000/".into(),
            ..Default::default()
        });
        assert_eq!(client.endpoint("x y"), "http://host:3000/api/onboarding/x%20y");
    }

    #[test]
    fn default_endpoint() {
        let client = OnboardingClient::new(ClientOptions::default());
        assert_eq!(
            client.endpoint("jakir-board"),
            "http://192.168.0.105:3000/api/onboarding/jakir-board"
        );
    }

    #[tokio::test]
    async fn whitespace_app_id_is_rejected_without_network() {
        // Unroutable base URL: any network attempt would not yield INVALID_APP_ID.
        let client = OnboardingClient::new(ClientOptions {
            base_url: "http://invalid.invalid".into(),
            timeout: Duration::from_millis(10),
        });
        let response = client.get_onboarding_data("   ").await;
        assert!(!response.is_success());
        assert_eq!(response.error.as_ref().unwrap().code, ErrorCode::InvalidAppId);
        assert!(response.error_message().contains("App ID must be a non-empty string"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_error(404, "a").code, ErrorCode::NotFound);
        assert!(status_error(404, "a").message.contains("Onboarding data not found"));
        assert_eq!(status_error(400, "a").code, ErrorCode::InvalidAppId);
        assert_eq!(status_error(500, "a").message, "Internal server error");
        let other = status_error(503, "a");
        assert_eq!(other.code, ErrorCode::ServerError);
        assert_eq!(other.message, "HTTP error: 503");
    }

    #[test]
    fn error_message_defaults() {
        let response = OnboardingResponse {
            success: false,
            data: None,
            error: None,
        };
        assert_eq!(response.error_message(), "Unknown error occurred");
        let response = OnboardingResponse::err(OnboardingError::new(
            ErrorCode::NotFound,
            "Onboarding data not found",
        ));
        assert_eq!(response.error_message(), "Onboarding data not found");
    }

    #[test]
    fn parse_config_requires_screens_array() {
        let err = parse_config(serde_json::json!({ "appId": "a", "screens": {} }), "a").unwrap_err();
        assert_eq!(err.message, "Invalid data format from server");

        let config = parse_config(serde_json::json!({ "screens": [] }), "filled").unwrap();
        assert_eq!(config.app_id, "filled");
    }

    #[test]
    fn parse_config_keeps_document_with_one_bad_element() {
        let config = parse_config(
            serde_json::json!({
                "screens": [{
                    "id": "s1",
                    "elements": [
                        { "id": "title", "type": "text", "props": { "text": "Hi" } },
                        { "id": "hero", "type": "image", "props": { "height": 120 } }
                    ]
                }]
            }),
            "a",
        )
        .unwrap();
        assert_eq!(config.screens[0].elements.len(), 2);
        assert_eq!(config.screens[0].elements[1].kind.type_name(), "image");
    }

    #[test]
    fn into_result() {
        let config = parse_config(serde_json::json!({ "screens": [] }), "a").unwrap();
        assert_eq!(OnboardingResponse::ok(config.clone()).into_result().unwrap(), config);
        let err = OnboardingResponse::err(OnboardingError::invalid_app_id())
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAppId);
    }
}
