//! REST-backed resource plugin
//!
//! A [`ResourceNuker`] driven entirely by a [`ResourceDef`]: listing goes
//! through the paginated fetcher, deletion issues one DELETE per identifier.

use super::fetcher;
use super::registry::ResourceDef;
use super::{ResourceNuker, Scope};
use crate::filter::ResourceValue;
use crate::rest::{ApiError, RestClient};
use anyhow::{Context, Result};
use async_trait::async_trait;

pub struct RestResource {
    key: String,
    def: ResourceDef,
    client: RestClient,
}

impl RestResource {
    pub fn new(key: impl Into<String>, def: ResourceDef, client: RestClient) -> Self {
        Self {
            key: key.into(),
            def,
            client,
        }
    }
}

#[async_trait]
impl ResourceNuker for RestResource {
    fn resource_type_name(&self) -> &str {
        &self.key
    }

    fn max_batch_size(&self) -> usize {
        self.def.max_batch_size
    }

    fn is_global(&self) -> bool {
        self.def.is_global
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<ResourceValue>> {
        fetcher::fetch_resources(&self.def, &self.client, scope).await
    }

    async fn delete_one(&self, scope: &Scope, identifier: &str) -> Result<()> {
        let url = fetcher::delete_url(&self.def, &self.client, scope, identifier)?;

        match self.client.delete(url.as_str()).await {
            Ok(_) => Ok(()),
            Err(e) if self.def.not_found_is_success && is_not_found(&e) => {
                tracing::debug!("{} {} already deleted", self.key, identifier);
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", self.def.display_name)),
        }
    }
}

fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_not_found)
}
