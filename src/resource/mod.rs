//! Resource abstraction layer
//!
//! Every resource type the engine can clean up is a value implementing
//! [`ResourceNuker`]. The engine is written once against that trait and never
//! branches on the concrete resource type.
//!
//! # Architecture
//!
//! - [`ResourceNuker`] - listing and single-resource deletion for one type
//! - [`NukerRegistry`] - explicit name -> plugin table handed to the orchestrator
//! - [`registry`] - resource definitions loaded from embedded JSON
//! - [`fetcher`] - paginated listing driven by a definition
//! - [`rest`] - the [`ResourceNuker`] built from a definition
//!
//! # Example
//!
//! ```ignore
//! use tnuke::resource::{NukerRegistry, RestResource};
//!
//! let mut nukers = NukerRegistry::new();
//! for (key, def) in tnuke::resource::get_registry().resources.iter() {
//!     nukers.register(Arc::new(RestResource::new(key, def.clone(), client.clone())))?;
//! }
//! ```

pub mod fetcher;
pub mod registry;
pub mod rest;

pub use registry::{get_all_resource_keys, get_registry, get_resource, ResourceConfig, ResourceDef};
pub use rest::RestResource;

use crate::engine::{NukeError, NukeResult};
use crate::filter::ResourceValue;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Location a resource type is listed and deleted in (zone, region or `global`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    pub const GLOBAL: &'static str = "global";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn global() -> Self {
        Self(Self::GLOBAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_global(&self) -> bool {
        self.0 == Self::GLOBAL
    }

    /// Region part of a zone ("us-central1-a" -> "us-central1"); regions and
    /// `global` are returned unchanged.
    pub fn region(&self) -> &str {
        match self.0.rsplit_once('-') {
            Some((region, zone))
                if zone.len() == 1 && zone.chars().all(|c| c.is_ascii_lowercase()) =>
            {
                region
            }
            _ => &self.0,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capabilities a resource-type plugin provides to the engine
#[async_trait]
pub trait ResourceNuker: Send + Sync {
    /// Name used for reporting and selection
    fn resource_type_name(&self) -> &str;

    /// How many identifiers may be deleted concurrently
    fn max_batch_size(&self) -> usize;

    /// Global types are processed once per run instead of once per scope
    fn is_global(&self) -> bool {
        false
    }

    /// List every candidate in `scope`, following pagination to the end
    async fn list(&self, scope: &Scope) -> anyhow::Result<Vec<ResourceValue>>;

    /// Delete exactly one resource
    async fn delete_one(&self, scope: &Scope, identifier: &str) -> anyhow::Result<()>;
}

/// Resource-type name -> plugin, iterated in name order
#[derive(Clone, Default)]
pub struct NukerRegistry {
    nukers: BTreeMap<String, Arc<dyn ResourceNuker>>,
}

impl NukerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, nuker: Arc<dyn ResourceNuker>) -> NukeResult<()> {
        let name = nuker.resource_type_name().to_string();
        if self.nukers.contains_key(&name) {
            return Err(NukeError::DuplicateResourceType(name));
        }
        self.nukers.insert(name, nuker);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ResourceNuker>> {
        self.nukers.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.nukers.keys().map(|s| s.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ResourceNuker>> {
        self.nukers.values()
    }

    pub fn len(&self) -> usize {
        self.nukers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nukers.is_empty()
    }

    /// Narrow the registry to `include` (all types when empty) minus `exclude`.
    ///
    /// Unknown names in either list are an error.
    pub fn select(&self, include: &[String], exclude: &[String]) -> NukeResult<NukerRegistry> {
        for name in include.iter().chain(exclude) {
            if !self.nukers.contains_key(name) {
                return Err(NukeError::UnknownResourceType(name.clone()));
            }
        }

        let nukers = self
            .nukers
            .iter()
            .filter(|(name, _)| include.is_empty() || include.contains(name))
            .filter(|(name, _)| !exclude.contains(name))
            .map(|(name, nuker)| (name.clone(), Arc::clone(nuker)))
            .collect();

        Ok(NukerRegistry { nukers })
    }
}

impl fmt::Debug for NukerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NukerRegistry")
            .field("resource_types", &self.names())
            .finish()
    }
}
