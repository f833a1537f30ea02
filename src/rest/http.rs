//! HTTP utilities for REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Non-success HTTP status returned by an API
#[derive(Debug, Error)]
#[error("API request failed: {status}{}", detail(.message))]
pub struct ApiError {
    pub status: StatusCode,
    /// Sanitized error message from the response body, if it had one
    pub message: Option<String>,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// Status carried by an error chain, if it came from an API response
pub fn api_status(error: &anyhow::Error) -> Option<StatusCode> {
    error.downcast_ref::<ApiError>().map(|e| e.status)
}

fn detail(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(" ({})", m)).unwrap_or_default()
}

/// Message of a Google-style `{"error": {"message": ...}}` body, else the body itself
fn error_message(body: &str) -> Option<String> {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    let message = sanitize_for_log(&message);
    (!message.is_empty()).then_some(message)
}

/// Truncate long responses and strip non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for REST API calls
#[derive(Clone, Debug)]
pub struct RestHttpClient {
    client: Client,
}

impl RestHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tnuke/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// GET a JSON document
    pub async fn get(&self, url: &str, token: Option<&str>) -> Result<Value> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url), token).await
    }

    /// DELETE a resource; an empty body yields `Value::Null`
    pub async fn delete(&self, url: &str, token: Option<&str>) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        self.send(self.client.delete(url), token).await
    }

    async fn send(&self, request: RequestBuilder, token: Option<&str>) -> Result<Value> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Callers decide whether a status is an error (404 on delete often is not)
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError {
                status,
                message: error_message(&body),
            }
            .into());
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}
