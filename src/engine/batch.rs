//! Batch planning
//!
//! Splits the selected identifiers of one resource type into groups small
//! enough that deleting a whole group concurrently stays under the remote
//! API's request rate.

use super::error::{NukeError, NukeResult};

/// Hard ceiling on identifiers handed to a single deletion call.
///
/// One request is issued per identifier, and many cloud APIs cap clients at
/// roughly 100 requests per second.
pub const MAX_CONCURRENT_DELETES: usize = 100;

/// Reject batch sizes the engine cannot honour
pub fn validate_batch_size(resource_type: &str, size: usize) -> NukeResult<usize> {
    if size == 0 || size > MAX_CONCURRENT_DELETES {
        return Err(NukeError::InvalidBatchSize {
            resource_type: resource_type.to_string(),
            size,
            limit: MAX_CONCURRENT_DELETES,
        });
    }
    Ok(size)
}

/// Partition `identifiers` into consecutive batches of at most `max_batch_size`.
///
/// Order is preserved within and across batches. An empty input yields no
/// batches; a zero `max_batch_size` is treated as one.
pub fn plan_batches<T: Clone>(identifiers: &[T], max_batch_size: usize) -> Vec<Vec<T>> {
    identifiers
        .chunks(max_batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
