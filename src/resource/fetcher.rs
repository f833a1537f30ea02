//! Resource Fetcher
//!
//! Lists resources from REST APIs based on resource definitions, following
//! page tokens until the listing is complete.

use super::registry::ResourceDef;
use crate::filter::ResourceValue;
use crate::resource::Scope;
use crate::rest::RestClient;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Result of paginated fetch
pub struct PaginatedResult {
    pub items: Vec<ResourceValue>,
    pub next_token: Option<String>,
}

/// Substitute `{project}`, `{scope}`, `{region}` and `{id}` in a path template
pub fn expand_template(template: &str, project: &str, scope: &Scope, id: Option<&str>) -> String {
    let mut expanded = template
        .replace("{project}", &urlencoding::encode(project))
        .replace("{scope}", &urlencoding::encode(scope.as_str()))
        .replace("{region}", &urlencoding::encode(scope.region()));
    if let Some(id) = id {
        expanded = expanded.replace("{id}", &urlencoding::encode(id));
    }
    expanded
}

/// URL of one list page
pub fn list_url(
    def: &ResourceDef,
    client: &RestClient,
    scope: &Scope,
    page_token: Option<&str>,
) -> Result<Url> {
    let path = expand_template(&def.list_path, &client.project_id, scope, None);
    let raw = format!("{}{}", client.base_url(&def.base_url), path);
    let mut url = Url::parse(&raw).with_context(|| format!("Invalid list URL: {}", raw))?;

    {
        let mut query = url.query_pairs_mut();
        for (key, value) in &def.list_params {
            let value = value
                .replace("{project}", &client.project_id)
                .replace("{scope}", scope.as_str())
                .replace("{region}", scope.region());
            query.append_pair(key, &value);
        }
        if let Some(token) = page_token {
            query.append_pair(&def.page_token_param, token);
        }
    }
    // query_pairs_mut leaves a bare '?' behind when nothing was appended
    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

/// URL deleting one resource
pub fn delete_url(def: &ResourceDef, client: &RestClient, scope: &Scope, id: &str) -> Result<Url> {
    let path = expand_template(&def.delete_path, &client.project_id, scope, Some(id));
    let raw = format!("{}{}", client.base_url(&def.base_url), path);
    Url::parse(&raw).with_context(|| format!("Invalid delete URL: {}", raw))
}

/// Fetch all resources (auto-paginate)
pub async fn fetch_resources(
    def: &ResourceDef,
    client: &RestClient,
    scope: &Scope,
) -> Result<Vec<ResourceValue>> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut seen_tokens = HashSet::new();

    loop {
        let result = fetch_resources_paginated(def, client, scope, page_token.as_deref()).await?;
        all_items.extend(result.items);

        match result.next_token {
            None => break,
            Some(next) if !seen_tokens.insert(next.clone()) => {
                bail!(
                    "{} listing returned the same page token twice ({})",
                    def.display_name,
                    next
                );
            }
            Some(next) => page_token = Some(next),
        }
    }

    Ok(all_items)
}

/// Fetch one page of resources
pub async fn fetch_resources_paginated(
    def: &ResourceDef,
    client: &RestClient,
    scope: &Scope,
    page_token: Option<&str>,
) -> Result<PaginatedResult> {
    let url = list_url(def, client, scope, page_token)?;
    let response = client
        .get(url.as_str())
        .await
        .with_context(|| format!("Failed to list {} in {}", def.display_name, scope))?;

    let items = extract_items(&response, &def.response_path)
        .iter()
        .map(|item| to_resource_value(item, def))
        .collect();

    let next_token = response
        .get(&def.next_page_token_field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    Ok(PaginatedResult { items, next_token })
}

/// Extract items from response using the response_path
fn extract_items<'a>(response: &'a Value, path: &str) -> &'a [Value] {
    let found = if path.is_empty() {
        Some(response)
    } else {
        extract_json_value(response, path)
    };
    found
        .and_then(|v| v.as_array())
        .map(|arr| arr.as_slice())
        .unwrap_or_default()
}

/// Build the filterable snapshot of one listed item
pub fn to_resource_value(item: &Value, def: &ResourceDef) -> ResourceValue {
    let name = extract_json_value(item, &def.id_field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let time = def.created_field.as_deref().and_then(|field| {
        let raw = extract_json_value(item, field)?.as_str()?;
        let parsed = parse_timestamp(raw);
        if parsed.is_none() {
            tracing::debug!("Unparsable {} '{}' on {:?}", field, raw, name);
        }
        parsed
    });

    let tags = def
        .tags_field
        .as_deref()
        .and_then(|field| extract_json_value(item, field))
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    ResourceValue { name, time, tags }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Extract a value from JSON using a dot-notation path (numeric parts index arrays)
pub fn extract_json_value<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(item, |current, part| match part.parse::<usize>() {
        Ok(idx) => current.get(idx),
        Err(_) => current.get(part),
    })
}
