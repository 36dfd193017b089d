//! Vendor API clients.
//!
//! Every external system is reached through one of three clients, and every
//! client surfaces the same normalized error type. Downstream code never
//! probes raw response shapes; the clients absorb the vendors' variants here.

pub mod filemaker;
pub mod quickbooks;
pub mod signing;
pub mod supabase;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

pub use filemaker::FileMakerClient;
pub use quickbooks::QuickBooksClient;
pub use supabase::SupabaseClient;

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity checks.
pub(crate) const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalized error for every vendor call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid configuration, raised before any network call
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-2xx HTTP response with the best message the body offered
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection, timeout, or other transport failure
    #[error("{0}")]
    Transport(String),

    /// A vendor fault carried inside an otherwise successful response
    #[error("{0}")]
    Vendor(String),

    /// A 2xx response whose body is not a shape we recognize
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Bundle of the three vendor clients handed to services and screens.
#[derive(Clone)]
pub struct Backend {
    pub filemaker: FileMakerClient,
    pub quickbooks: QuickBooksClient,
    pub supabase: SupabaseClient,
}

/// Build the vendor clients from configuration.
///
/// Fails up front when a credential is missing, so no screen can issue a
/// half-configured request later.
pub fn init(config: &Config) -> ApiResult<Backend> {
    if config.filemaker_api_token.trim().is_empty() {
        return Err(ApiError::Config(
            "FILEMAKER_API_TOKEN is not set".to_string(),
        ));
    }
    if config.backend_hmac_secret.trim().is_empty() {
        return Err(ApiError::Config(
            "BACKEND_HMAC_SECRET is not set".to_string(),
        ));
    }

    let http = Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| ApiError::Config(format!("failed to create HTTP client: {e}")))?;

    Ok(Backend {
        filemaker: FileMakerClient::new(
            http.clone(),
            &config.filemaker_api_url,
            &config.filemaker_api_token,
        ),
        quickbooks: QuickBooksClient::new(
            http.clone(),
            &config.backend_api_url,
            &config.backend_hmac_secret,
        ),
        supabase: SupabaseClient::new(
            http,
            &config.backend_api_url,
            &config.backend_hmac_secret,
        ),
    })
}

/// Minimal percent-encoding for query-string values.
pub(crate) fn urlencode(raw: &str) -> String {
    raw.bytes()
        .flat_map(|b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                vec![b as char]
            } else {
                format!("%{b:02X}").chars().collect()
            }
        })
        .collect()
}

/// Strip trailing slashes so path joins are predictable.
pub(crate) fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Convert a `reqwest::Error` into a user-facing transport message.
pub(crate) fn friendly_error(url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_connect() {
        return ApiError::Transport(format!("cannot reach {url}"));
    }
    if err.is_timeout() {
        return ApiError::Transport(format!("request to {url} timed out"));
    }
    if err.is_builder() {
        return ApiError::Config(format!("invalid URL: {url}"));
    }
    ApiError::Transport(format!("network error communicating with {url}: {err}"))
}

/// Map a non-2xx response to a normalized error, extracting whatever message
/// the body carries.
pub(crate) fn status_error(status: StatusCode, body: Option<&Value>) -> ApiError {
    let message = match body {
        Some(body) => extract_error_message(body),
        None => default_status_message(status),
    };
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

fn default_status_message(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "credentials rejected".to_string(),
        403 => "not authorized".to_string(),
        404 => "endpoint not found".to_string(),
        s if s >= 500 => format!("server error (HTTP {s})"),
        s => format!("unexpected response (HTTP {s})"),
    }
}

/// Pull a human-readable message out of a vendor error body.
///
/// The vendors disagree on where the message lives, so this probes the known
/// spots in a fixed order: `detail`, `error`, `message`,
/// `Fault.Error[0].Detail`, then the raw `Fault` object.
pub fn extract_error_message(body: &Value) -> String {
    for key in ["detail", "error", "message"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            if !msg.is_empty() {
                return msg.to_string();
            }
        }
    }

    if let Some(fault) = body.get("Fault") {
        if let Some(detail) = fault
            .get("Error")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(|e| e.get("Detail"))
            .and_then(Value::as_str)
        {
            return detail.to_string();
        }
        return fault.to_string();
    }

    "request failed".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_detail_field_first() {
        let body = json!({"detail": "record missing", "error": "other"});
        assert_eq!(extract_error_message(&body), "record missing");
    }

    #[test]
    fn extracts_error_field() {
        let body = json!({"error": "bad request"});
        assert_eq!(extract_error_message(&body), "bad request");
    }

    #[test]
    fn extracts_message_field() {
        let body = json!({"message": "not found"});
        assert_eq!(extract_error_message(&body), "not found");
    }

    #[test]
    fn extracts_qbo_fault_detail() {
        let body = json!({"Fault": {"Error": [{"Detail": "Duplicate Name"}]}});
        assert_eq!(extract_error_message(&body), "Duplicate Name");
    }

    #[test]
    fn falls_back_to_raw_fault() {
        let body = json!({"Fault": {"type": "ValidationFault"}});
        let msg = extract_error_message(&body);
        assert!(msg.contains("ValidationFault"));
    }

    #[test]
    fn falls_back_to_generic_message() {
        let body = json!({"unrelated": true});
        assert_eq!(extract_error_message(&body), "request failed");
    }

    #[test]
    fn normalizes_trailing_slashes() {
        assert_eq!(
            normalize_base_url("https://backend.example.com/api//"),
            "https://backend.example.com/api"
        );
        assert_eq!(
            normalize_base_url("https://backend.example.com"),
            "https://backend.example.com"
        );
    }
}
