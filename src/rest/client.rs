//! REST Client
//!
//! Combines credentials and the HTTP client, and carries the project the
//! resource definitions are expanded against.

use super::auth::Credentials;
use super::http::RestHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct RestClient {
    pub credentials: Credentials,
    pub http: RestHttpClient,
    pub project_id: String,
    /// Replaces every definition's `base_url` (emulators, tests)
    pub endpoint_override: Option<String>,
}

impl RestClient {
    pub fn new(project_id: &str, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            credentials,
            http: RestHttpClient::new()?,
            project_id: project_id.to_string(),
            endpoint_override: None,
        })
    }

    /// Client using ADC or `TNUKE_ACCESS_TOKEN`
    pub async fn from_env(project_id: &str) -> Result<Self> {
        let credentials = Credentials::from_env()
            .await
            .context("Failed to initialize credentials")?;
        Self::new(project_id, credentials)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    /// Base URL to use for a definition
    pub fn base_url<'a>(&'a self, default: &'a str) -> &'a str {
        self.endpoint_override
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.credentials.token().await?;
        self.http.get(url, token.as_deref()).await
    }

    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.credentials.token().await?;
        self.http.delete(url, token.as_deref()).await
    }
}

