//! Response classification
//!
//! Every decision the client makes about a failed response (refresh and
//! retry, wipe credentials, or surface the error) is driven by the
//! [`ErrorKind`] produced here. The remote service only distinguishes an
//! expired access token from an invalid one through the wording of its
//! `errors` array, so the markers are data rather than scattered string checks
//! and can be replaced when that wording changes.

use crate::error::{ApiError, ErrorKind};
use reqwest::StatusCode;
use serde_json::Value;

const MAX_RAW_MESSAGE: usize = 512;

/// OAuth error codes that reject the refresh grant itself
const GRANT_REJECTIONS: [&str; 2] = ["invalid_grant", "invalid_client"];

/// Client errors that are about request pacing, not the grant
const RETRYABLE_CLIENT_ERRORS: [StatusCode; 2] =
    [StatusCode::REQUEST_TIMEOUT, StatusCode::TOO_MANY_REQUESTS];

#[derive(Debug, Clone)]
pub struct Classifier {
    expired_markers: Vec<String>,
    invalid_markers: Vec<String>,
    grant_markers: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_markers(["expired"], ["invalid"])
    }
}

impl Classifier {
    /// Build a classifier with custom case-insensitive markers
    pub fn with_markers<E, I>(expired: E, invalid: I) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            expired_markers: expired
                .into_iter()
                .map(|m| m.into().to_lowercase())
                .collect(),
            invalid_markers: invalid
                .into_iter()
                .map(|m| m.into().to_lowercase())
                .collect(),
            grant_markers: Vec::new(),
        }
    }

    /// Add case-insensitive message markers that reject a refresh grant
    ///
    /// The OAuth `invalid_grant` and `invalid_client` codes always do.
    pub fn with_grant_markers<G>(mut self, markers: G) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
    {
        self.grant_markers = markers
            .into_iter()
            .map(|m| m.into().to_lowercase())
            .collect();
        self
    }

    /// Classify a non-2xx response from an API endpoint
    ///
    /// Only authenticated requests can produce `TokenExpired` or
    /// `TokenInvalid`. Expired markers win over invalid ones.
    pub fn classify_api(&self, status: u16, body: &str, requires_auth: bool) -> ApiError {
        let message = extract_message(status, body);

        if requires_auth && status == StatusCode::UNAUTHORIZED.as_u16() {
            let lowered = message.to_lowercase();
            if contains_any(&lowered, &self.expired_markers) {
                return ApiError::new(ErrorKind::TokenExpired, message);
            }
            if contains_any(&lowered, &self.invalid_markers) {
                return ApiError::new(ErrorKind::TokenInvalid, message);
            }
        }

        ApiError::remote(status, message)
    }

    /// Classify a non-2xx response from the token endpoint
    ///
    /// Only a client error naming the grant as rejected (an OAuth
    /// `invalid_grant`/`invalid_client` code or a grant marker) yields
    /// `RefreshGrantInvalid`. Rate limiting, request timeouts, other client
    /// errors and server errors say nothing about the refresh token.
    pub fn classify_token(&self, status: u16, body: &str) -> ApiError {
        let message = extract_message(status, body);

        let client_error = (400..500).contains(&status)
            && !RETRYABLE_CLIENT_ERRORS
                .iter()
                .any(|s| s.as_u16() == status);
        if client_error && self.rejects_grant(body, &message) {
            ApiError::new(ErrorKind::RefreshGrantInvalid, message)
        } else {
            ApiError::remote(status, message)
        }
    }

    fn rejects_grant(&self, body: &str, message: &str) -> bool {
        let code = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_lowercase));
        if let Some(code) = code {
            if GRANT_REJECTIONS.contains(&code.as_str()) {
                return true;
            }
        }

        contains_any(&message.to_lowercase(), &self.grant_markers)
    }
}

fn contains_any(haystack: &str, markers: &[String]) -> bool {
    markers
        .iter()
        .any(|m| !m.is_empty() && haystack.contains(m.as_str()))
}

/// Pull the human-readable message out of an error body
///
/// Looks at `errors` (array or string), `error_description`, `error` and
/// `message` in that order, then falls back to the raw body and finally to the
/// status line.
pub fn extract_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = message_from_json(&value) {
            return message;
        }
    }

    let raw = body.trim();
    if !raw.is_empty() {
        return raw.chars().take(MAX_RAW_MESSAGE).collect();
    }

    match StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("HTTP {} {}", status, reason),
        None => format!("HTTP {}", status),
    }
}

fn message_from_json(value: &Value) -> Option<String> {
    match value.get("errors") {
        Some(Value::Array(errors)) => {
            let parts: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
            if !parts.is_empty() {
                return Some(parts.join(", "));
            }
        }
        Some(Value::String(error)) if !error.is_empty() => return Some(error.clone()),
        _ => {}
    }

    ["error_description", "error", "message"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
