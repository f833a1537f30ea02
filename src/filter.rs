//! Filter Rules
//!
//! Decides, for one listed resource, whether it should be acted on given the
//! include and exclude rules configured for its resource type.
//!
//! Rules are built once from user configuration and only read afterwards, so a
//! single [`ResourceType`] can be shared across concurrent evaluations.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

/// Snapshot of one listed resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceValue {
    /// Name used both for matching and as the deletion identifier
    pub name: Option<String>,
    /// Creation timestamp, when the API exposes one
    pub time: Option<DateTime<Utc>>,
    /// Labels/tags, when the API exposes them
    pub tags: HashMap<String, String>,
}

impl ResourceValue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Compiled name pattern together with the text it was built from
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    re: Regex,
}

impl Expression {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: pattern.to_string(),
            re: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.re.is_match(haystack)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = String::deserialize(deserializer)?;
        Expression::new(&pattern).map_err(|e| {
            serde::de::Error::custom(format!("invalid pattern '{}': {}", pattern, e))
        })
    }
}

/// One side (include or exclude) of a resource type's filter
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterRule {
    /// Name patterns; an empty list places no constraint on the name
    pub names_regex: Vec<Expression>,
    /// Boundary for resources created after this instant
    pub time_after: Option<DateTime<Utc>>,
    /// Boundary for resources created before this instant
    pub time_before: Option<DateTime<Utc>>,
    /// Tag key -> value pattern
    pub tags: BTreeMap<String, Expression>,
}

impl FilterRule {
    /// An absent name never matches.
    fn matches_name(&self, name: Option<&str>) -> bool {
        name.is_some_and(|name| self.names_regex.iter().any(|re| re.is_match(name)))
    }

    fn matches_tags(&self, tags: &HashMap<String, String>) -> bool {
        self.tags
            .iter()
            .any(|(key, re)| tags.get(key).is_some_and(|value| re.is_match(value)))
    }
}

/// Include/exclude pair configured for one resource type
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceType {
    pub include: FilterRule,
    pub exclude: FilterRule,
}

impl ResourceType {
    pub fn should_include(&self, value: &ResourceValue) -> bool {
        should_include(value, &self.include, &self.exclude)
    }
}

/// Evaluate one candidate against an include and an exclude rule.
///
/// Include bounds are inclusive (a resource created exactly at
/// `include.time_after` is kept) and exclude bounds are strict. Time clauses
/// only apply when the candidate carries a timestamp.
pub fn should_include(value: &ResourceValue, include: &FilterRule, exclude: &FilterRule) -> bool {
    let name = value.name.as_deref();

    if !include.names_regex.is_empty() && !include.matches_name(name) {
        return false;
    }
    if !include.tags.is_empty() && !include.matches_tags(&value.tags) {
        return false;
    }
    if let Some(time) = value.time {
        if include.time_after.is_some_and(|after| time < after) {
            return false;
        }
        if include.time_before.is_some_and(|before| time > before) {
            return false;
        }
    }

    if exclude.matches_name(name) || exclude.matches_tags(&value.tags) {
        return false;
    }
    if let Some(time) = value.time {
        if exclude.time_after.is_some_and(|after| time > after) {
            return false;
        }
        if exclude.time_before.is_some_and(|before| time < before) {
            return false;
        }
    }

    true
}
