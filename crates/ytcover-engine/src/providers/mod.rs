use std::error::Error as _;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

use crate::error::{CoverError, Result};

pub mod gemini;
pub mod openai;

const ERROR_BODY_MAX_CHARS: usize = 65_536;

/// Client used when the caller does not inject one. Image generation can run
/// for minutes, so no total timeout is set; callers that want a deadline pass
/// their own configured client.
pub fn default_http_client() -> Result<HttpClient> {
    HttpClient::builder()
        .timeout(None)
        .build()
        .map_err(|err| CoverError::Configuration(format!("failed to build HTTP client: {err}")))
}

pub(crate) fn ensure_image_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CoverError::NotFound(path.to_path_buf()))
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Reads the body, rejecting statuses `accept` refuses, and parses it as JSON.
pub(crate) fn response_json_or_error(
    provider: &str,
    response: HttpResponse,
    accept: impl Fn(u16) -> bool,
) -> Result<Value> {
    let code = response.status().as_u16();
    let body = response.text().map_err(|err| {
        CoverError::provider(provider, format!("response body read failed: {err}"))
    })?;
    if !accept(code) {
        return Err(CoverError::provider(
            provider,
            format!(
                "API error ({code}): {}",
                truncate_text(&body, ERROR_BODY_MAX_CHARS)
            ),
        ));
    }
    serde_json::from_str(&body).map_err(|err| {
        CoverError::provider(
            provider,
            format!(
                "invalid JSON payload ({err}): {}",
                truncate_text(&body, ERROR_BODY_MAX_CHARS)
            ),
        )
    })
}

/// Flattens a transport error and its causes into one line, without the URL.
pub(crate) fn describe_transport_error(err: reqwest::Error) -> String {
    let timed_out = err.is_timeout();
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    if timed_out && !message.contains("timed out") {
        message.push_str(" (timed out)");
    }
    message
}

pub(crate) fn decode_image_payload(provider: &str, data: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data.trim().as_bytes())
        .map_err(|err| CoverError::provider(provider, format!("image base64 decode failed: {err}")))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
