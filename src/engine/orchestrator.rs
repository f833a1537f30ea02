//! Orchestrator
//!
//! Drives one resource type through list -> filter -> batch -> delete, and a
//! whole run through every registered type and scope.

use super::batch::{plan_batches, validate_batch_size};
use super::deleter::delete_batch;
use super::error::{MultiError, NukeError, NukeResult, RunError};
use crate::config::RulesConfig;
use crate::resource::{NukerRegistry, ResourceNuker, Scope};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stage of a single resource-type run. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Listing,
    Filtering,
    Batching,
    Deleting,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Listing => "listing",
            Self::Filtering => "filtering",
            Self::Batching => "batching",
            Self::Deleting => "deleting",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Outcome of one resource type in one scope
#[derive(Debug)]
pub struct ResourceTypeReport {
    pub resource_type: String,
    pub scope: Scope,
    /// Candidates returned by the listing call
    pub listed: usize,
    /// Identifiers that survived the filter rules, in listing order
    pub selected: Vec<String>,
    pub batches: usize,
    /// Deletion attempts made (always zero in dry-run mode)
    pub attempted: usize,
    pub phase: RunPhase,
    pub dry_run: bool,
    /// Every identifier whose deletion failed
    pub failures: Option<MultiError>,
}

impl ResourceTypeReport {
    fn new(resource_type: &str, scope: &Scope, dry_run: bool) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            scope: scope.clone(),
            listed: 0,
            selected: Vec::new(),
            batches: 0,
            attempted: 0,
            phase: RunPhase::Listing,
            dry_run,
            failures: None,
        }
    }

    /// Fresh non-dry report carrying a preview's selection, ready for deletion
    fn from_preview(preview: &ResourceTypeReport) -> Self {
        Self {
            listed: preview.listed,
            selected: preview.selected.clone(),
            batches: preview.batches,
            phase: RunPhase::Batching,
            ..Self::new(&preview.resource_type, &preview.scope, false)
        }
    }

    fn advance(&mut self, next: RunPhase) {
        debug_assert!(next > self.phase, "phase went from {} to {}", self.phase, next);
        debug!(
            resource_type = %self.resource_type,
            scope = %self.scope,
            "{} -> {}",
            self.phase,
            next
        );
        self.phase = next;
    }

    pub fn failed(&self) -> usize {
        self.failures.as_ref().map_or(0, MultiError::len)
    }

    pub fn deleted(&self) -> usize {
        self.attempted - self.failed()
    }

    /// Collapse the report into "no error" or the composite deletion error
    pub fn into_result(self) -> NukeResult<()> {
        match self.failures {
            Some(failures) => Err(NukeError::Deletion(failures)),
            None => Ok(()),
        }
    }
}

/// One (resource type, scope) entry of a run
#[derive(Debug)]
pub struct RunOutcome {
    pub resource_type: String,
    pub scope: Scope,
    pub result: NukeResult<ResourceTypeReport>,
}

/// Outcomes of a full run, in processing order
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<RunOutcome>,
}

impl RunReport {
    pub fn reports(&self) -> impl Iterator<Item = &ResourceTypeReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn total_selected(&self) -> usize {
        self.reports().map(|r| r.selected.len()).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.reports().map(ResourceTypeReport::deleted).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.reports().map(ResourceTypeReport::failed).sum()
    }

    /// Listing/configuration errors and per-type deletion failures, merged
    pub fn into_result(self) -> Result<(), RunError> {
        let mut errors = RunError::default();
        for outcome in self.outcomes {
            let err = match outcome.result {
                Ok(report) => match report.into_result() {
                    Ok(()) => continue,
                    Err(e) => e,
                },
                Err(e) => e,
            };
            errors.push(outcome.resource_type, outcome.scope, err);
        }
        errors.into_result()
    }
}

/// Runs the nuke pipeline against an injected registry of plugins
pub struct Orchestrator {
    registry: NukerRegistry,
    rules: RulesConfig,
    dry_run: bool,
}

impl Orchestrator {
    pub fn new(registry: NukerRegistry, rules: RulesConfig) -> Self {
        Self {
            registry,
            rules,
            dry_run: false,
        }
    }

    /// List and filter only; never delete
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one registered resource type in one scope
    pub async fn nuke_resource_type(
        &self,
        resource_type: &str,
        scope: &Scope,
    ) -> NukeResult<ResourceTypeReport> {
        let nuker = self
            .registry
            .get(resource_type)
            .ok_or_else(|| NukeError::UnknownResourceType(resource_type.to_string()))?;
        self.run_nuker(nuker, scope).await
    }

    /// Run every registered type: regional types once per scope, global types
    /// once. Types are processed one after another in registry order and a
    /// failing type does not stop the run.
    pub async fn run(&self, scopes: &[Scope]) -> RunReport {
        let mut report = RunReport::default();
        let global = [Scope::global()];

        for nuker in self.registry.iter() {
            let type_scopes: &[Scope] = if nuker.is_global() { &global } else { scopes };

            for scope in type_scopes {
                let result = self.run_nuker(nuker, scope).await;
                if let Err(e) = &result {
                    warn!("{} in {}: {}", nuker.resource_type_name(), scope, e);
                }
                report.outcomes.push(RunOutcome {
                    resource_type: nuker.resource_type_name().to_string(),
                    scope: scope.clone(),
                    result,
                });
            }
        }

        info!(
            selected = report.total_selected(),
            deleted = report.total_deleted(),
            failed = report.total_failed(),
            dry_run = self.dry_run,
            "Run complete"
        );
        report
    }

    /// Delete exactly the identifiers a dry-run `preview` selected, without
    /// listing again. Outcomes that failed in the preview are carried over
    /// unchanged. A dry-run orchestrator returns the preview as is.
    pub async fn nuke_selected(&self, preview: RunReport) -> RunReport {
        if self.dry_run {
            return preview;
        }

        let mut report = RunReport::default();
        for outcome in preview.outcomes {
            let result = match outcome.result {
                Ok(selection) if !selection.selected.is_empty() => {
                    let result = self.nuke_selection(&selection).await;
                    if let Err(e) = &result {
                        warn!("{} in {}: {}", outcome.resource_type, outcome.scope, e);
                    }
                    result
                }
                Ok(selection) => Ok(ResourceTypeReport {
                    dry_run: false,
                    ..selection
                }),
                Err(e) => Err(e),
            };
            report.outcomes.push(RunOutcome { result, ..outcome });
        }

        info!(
            deleted = report.total_deleted(),
            failed = report.total_failed(),
            "Nuked previewed resources"
        );
        report
    }

    async fn nuke_selection(&self, selection: &ResourceTypeReport) -> NukeResult<ResourceTypeReport> {
        let nuker = self
            .registry
            .get(&selection.resource_type)
            .ok_or_else(|| NukeError::UnknownResourceType(selection.resource_type.clone()))?;
        let max_batch_size = validate_batch_size(&selection.resource_type, nuker.max_batch_size())?;

        let mut report = ResourceTypeReport::from_preview(selection);
        self.delete_selected(nuker, &mut report, max_batch_size).await?;
        Ok(report)
    }

    async fn run_nuker(
        &self,
        nuker: &Arc<dyn ResourceNuker>,
        scope: &Scope,
    ) -> NukeResult<ResourceTypeReport> {
        let resource_type = nuker.resource_type_name();
        let max_batch_size = validate_batch_size(resource_type, nuker.max_batch_size())?;
        let mut report = ResourceTypeReport::new(resource_type, scope, self.dry_run);

        let candidates = nuker.list(scope).await.map_err(|source| NukeError::Listing {
            resource_type: resource_type.to_string(),
            scope: scope.to_string(),
            source,
        })?;
        report.listed = candidates.len();

        report.advance(RunPhase::Filtering);
        let rules = self.rules.rules_for(resource_type);
        for candidate in &candidates {
            if !rules.should_include(candidate) {
                continue;
            }
            match &candidate.name {
                Some(name) => report.selected.push(name.clone()),
                None => debug!("Skipping unnamed {} in {}", resource_type, scope),
            }
        }
        info!(
            "Found {} {} in {} ({} selected)",
            report.listed,
            resource_type,
            scope,
            report.selected.len()
        );

        report.advance(RunPhase::Batching);
        report.batches = report.selected.len().div_ceil(max_batch_size);

        if self.dry_run {
            for identifier in &report.selected {
                info!("[DRY RUN] Would nuke {} {} in {}", resource_type, identifier, scope);
            }
            report.advance(RunPhase::Done);
            return Ok(report);
        }

        self.delete_selected(nuker, &mut report, max_batch_size).await?;
        Ok(report)
    }

    /// Batch and delete `report.selected`, one batch at a time
    async fn delete_selected(
        &self,
        nuker: &Arc<dyn ResourceNuker>,
        report: &mut ResourceTypeReport,
        max_batch_size: usize,
    ) -> NukeResult<()> {
        let resource_type = nuker.resource_type_name();
        let scope = report.scope.clone();
        let batches = plan_batches(&report.selected, max_batch_size);
        report.batches = batches.len();

        report.advance(RunPhase::Deleting);
        let mut failures = MultiError::new();
        for (i, batch) in batches.iter().enumerate() {
            debug!(
                "Batch {}/{}: nuking {} {} in {}",
                i + 1,
                report.batches,
                batch.len(),
                resource_type,
                scope
            );
            report.attempted += batch.len();
            match delete_batch(Arc::clone(nuker), &scope, batch).await {
                Ok(()) => {}
                Err(NukeError::Deletion(batch_failures)) => failures.extend(batch_failures),
                Err(e) => return Err(e),
            }
        }

        report.failures = failures.into_option();
        report.advance(RunPhase::Done);

        if report.failed() > 0 {
            warn!(
                "Nuked {} of {} {} in {} ({} failed)",
                report.deleted(),
                report.attempted,
                resource_type,
                scope,
                report.failed()
            );
        } else {
            info!("Nuked {} {} in {}", report.deleted(), resource_type, scope);
        }

        Ok(())
    }
}
