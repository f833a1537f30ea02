//! tnuke - inventory and bulk-delete cloud resources
//!
//! Every resource type goes through the same pipeline: list candidates, keep
//! the ones the include/exclude rules select, split them into rate-safe
//! batches and delete each batch concurrently, collecting every failure.
//!
//! # Module Structure
//!
//! - [`filter`] - include/exclude rule evaluation
//! - [`engine`] - batching, concurrent deletion, error aggregation, orchestration
//! - [`resource`] - the plugin trait, the plugin registry and the REST plugin
//! - [`rest`] - HTTP client and credentials
//! - [`config`] - user settings and filter rule files

pub mod config;
pub mod engine;
pub mod filter;
pub mod resource;
pub mod rest;

pub use config::{Config, GlobalFilters, RulesConfig};
pub use engine::{NukeError, NukeResult, Orchestrator, RunReport};
pub use filter::{should_include, Expression, FilterRule, ResourceType, ResourceValue};
pub use resource::{NukerRegistry, ResourceNuker, Scope};
