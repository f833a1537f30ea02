//! Concurrent batch deletion
//!
//! There is no bulk delete for most resource types, so a batch is deleted by
//! spawning one task per identifier and waiting for all of them.

use super::batch::MAX_CONCURRENT_DELETES;
use super::error::{aggregate, NukeError, NukeResult};
use crate::resource::{ResourceNuker, Scope};
use anyhow::anyhow;
use std::sync::Arc;
use tracing::{debug, error};

/// Delete every identifier of one batch concurrently.
///
/// Each identifier gets exactly one attempt. A failing attempt does not cancel
/// its siblings; all failures are returned together, in dispatch order.
pub async fn delete_batch(
    nuker: Arc<dyn ResourceNuker>,
    scope: &Scope,
    identifiers: &[String],
) -> NukeResult<()> {
    let resource_type = nuker.resource_type_name().to_string();

    if identifiers.is_empty() {
        debug!("No {} to nuke in {}", resource_type, scope);
        return Ok(());
    }

    // Callers plan batches; this is the per-call ceiling.
    if identifiers.len() > MAX_CONCURRENT_DELETES {
        error!(
            "Nuking too many {} at once ({}): halting to avoid hitting API rate limiting",
            resource_type, MAX_CONCURRENT_DELETES
        );
        return Err(NukeError::TooManyIdentifiers {
            resource_type,
            requested: identifiers.len(),
            limit: MAX_CONCURRENT_DELETES,
        });
    }

    debug!("Deleting {} {} in {}", identifiers.len(), resource_type, scope);

    let handles: Vec<_> = identifiers
        .iter()
        .map(|identifier| {
            let nuker = Arc::clone(&nuker);
            let scope = scope.clone();
            let identifier = identifier.clone();
            tokio::spawn(async move { nuker.delete_one(&scope, &identifier).await })
        })
        .collect();

    let results = futures::future::join_all(handles).await;

    let outcomes = identifiers.iter().zip(results).map(|(identifier, joined)| {
        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(anyhow!("deletion task did not complete: {}", e)),
        };
        match &result {
            Ok(()) => debug!("[OK] {} {}", resource_type, identifier),
            Err(e) => debug!("[Failed] {} {}: {:#}", resource_type, identifier, e),
        }
        (identifier.clone(), result)
    });

    match aggregate(outcomes) {
        Some(failures) => Err(NukeError::Deletion(failures)),
        None => Ok(()),
    }
}
