//! Resource Registry - Load resource definitions from JSON
//!
//! Definitions for common Google Cloud resources are embedded at compile time.
//! Users can add or override definitions with their own JSON/YAML file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/compute.json"),
    include_str!("../resources/storage.json"),
    include_str!("../resources/gke.json"),
];

/// Resource definition from JSON
///
/// Path templates may contain `{project}`, `{scope}`, `{region}` and, for
/// `delete_path`, `{id}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResourceDef {
    pub display_name: String,
    pub base_url: String,
    pub list_path: String,
    pub delete_path: String,
    /// Extra query parameters for the list call (values are templates too)
    #[serde(default)]
    pub list_params: BTreeMap<String, String>,
    /// Dot path to the item array in a list response
    #[serde(default = "default_response_path")]
    pub response_path: String,
    /// Item field holding the name used for matching and deletion
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Item field holding an RFC 3339 creation timestamp
    #[serde(default)]
    pub created_field: Option<String>,
    /// Item field holding a string -> string label/tag map
    #[serde(default)]
    pub tags_field: Option<String>,
    #[serde(default = "default_page_token_param")]
    pub page_token_param: String,
    #[serde(default = "default_next_page_token_field")]
    pub next_page_token_field: String,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default)]
    pub is_global: bool,
    /// Treat a 404 on delete as already deleted
    #[serde(default = "default_true")]
    pub not_found_is_success: bool,
}

fn default_response_path() -> String {
    "items".to_string()
}

fn default_id_field() -> String {
    "name".to_string()
}

fn default_page_token_param() -> String {
    "pageToken".to_string()
}

fn default_next_page_token_field() -> String {
    "nextPageToken".to_string()
}

fn default_max_batch_size() -> usize {
    20
}

fn default_true() -> bool {
    true
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

impl ResourceConfig {
    /// Parse a definitions document (YAML is a superset of JSON)
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse resource definitions")
    }

    /// Embedded definitions overlaid with the ones in `path`
    pub fn with_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read resource definitions {}", path.display()))?;
        let user = Self::parse(&content)
            .with_context(|| format!("Invalid resource definitions {}", path.display()))?;

        let mut merged = get_registry().clone();
        for (key, def) in user.resources {
            if merged.resources.contains_key(&key) {
                tracing::info!("Overriding built-in resource definition {}", key);
            }
            merged.resources.insert(key, def);
        }
        Ok(merged)
    }

    /// Keys in name order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.resources.keys().map(|s| s.as_str()).collect();
        keys.sort_unstable();
        keys
    }
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig::default();

        for content in RESOURCE_FILES {
            // Embedded files are covered by tests; a parse failure is a build defect.
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all resource keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    get_registry().keys()
}
