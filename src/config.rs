//! Configuration Management
//!
//! Two files are involved:
//! - user settings (`config.json`): default project, scopes and file locations
//! - filter rules (`rules.yaml`): include/exclude rules per resource type

use crate::filter::ResourceType;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tnuke"))
}

/// User settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Project used when none is given on the command line
    #[serde(default)]
    pub project_id: Option<String>,
    /// Zones/regions used when none are given on the command line
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Filter rules file
    #[serde(default)]
    pub rules_file: Option<PathBuf>,
    /// Extra resource definitions
    #[serde(default)]
    pub resources_file: Option<PathBuf>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join("config.json"))
    }

    /// Load settings from disk; missing or unreadable files yield defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed settings file {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self) -> Option<String> {
        self.project_id
            .clone()
            .or_else(crate::rest::auth::get_default_project)
    }

    /// Get effective scopes (CLI > config > gcloud default zone)
    pub fn effective_scopes(&self) -> Vec<String> {
        if !self.scopes.is_empty() {
            return self.scopes.clone();
        }
        crate::rest::auth::get_default_zone()
            .map(|zone| vec![zone])
            .unwrap_or_default()
    }

    /// Rules file (CLI > config > `<config dir>/tnuke/rules.yaml` when present)
    pub fn effective_rules_file(&self) -> Option<PathBuf> {
        self.rules_file.clone().or_else(|| {
            config_dir()
                .map(|p| p.join("rules.yaml"))
                .filter(|p| p.exists())
        })
    }
}

/// Time boundaries applied to every resource type that does not set its own
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalFilters {
    /// Becomes `exclude.time_after`: keep anything newer than this
    pub exclude_after: Option<DateTime<Utc>>,
    /// Becomes `include.time_after`: only act on resources newer than this
    pub include_after: Option<DateTime<Utc>>,
}

impl GlobalFilters {
    /// `--older-than` / `--newer-than` durations relative to `now`
    pub fn from_durations(
        older_than: Option<Duration>,
        newer_than: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let before_now = |d: Duration| -> Result<DateTime<Utc>> {
            let d = chrono::Duration::from_std(d).context("Duration out of range")?;
            now.checked_sub_signed(d).context("Duration out of range")
        };

        Ok(Self {
            exclude_after: older_than.map(before_now).transpose()?,
            include_after: newer_than.map(before_now).transpose()?,
        })
    }
}

/// Filter rules for every configured resource type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulesConfig {
    resource_types: BTreeMap<String, ResourceType>,
    globals: GlobalFilters,
}

impl RulesConfig {
    /// Parse a rules document; top-level keys are resource type names
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let resource_types: Option<BTreeMap<String, ResourceType>> =
            serde_yaml::from_str(content).context("Failed to parse filter rules")?;
        Ok(Self {
            resource_types: resource_types.unwrap_or_default(),
            globals: GlobalFilters::default(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid rules file {}", path.display()))
    }

    pub fn with_globals(mut self, globals: GlobalFilters) -> Self {
        self.globals = globals;
        self
    }

    pub fn insert(&mut self, resource_type: impl Into<String>, rules: ResourceType) {
        self.resource_types.insert(resource_type.into(), rules);
    }

    /// Resource type names that have rules
    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resource_types.keys().map(|s| s.as_str())
    }

    /// Effective rules for one type, with global boundaries filled in
    pub fn rules_for(&self, resource_type: &str) -> ResourceType {
        let mut rules = self
            .resource_types
            .get(resource_type)
            .cloned()
            .unwrap_or_default();

        if rules.exclude.time_after.is_none() {
            rules.exclude.time_after = self.globals.exclude_after;
        }
        if rules.include.time_after.is_none() {
            rules.include.time_after = self.globals.include_after;
        }
        rules
    }
}
