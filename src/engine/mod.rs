//! Nuke engine
//!
//! The generic pipeline every resource type goes through:
//!
//! ```text
//! ResourceNuker::list ─▶ filter::should_include ─▶ batch::plan_batches
//!                                                        │
//!            error::aggregate ◀── deleter::delete_batch ◀┘  (one batch at a time)
//! ```
//!
//! - [`batch`] - rate-safe batch planning and the per-call ceiling
//! - [`deleter`] - concurrent deletion of one batch
//! - [`error`] - error kinds and failure aggregation
//! - [`orchestrator`] - per-type pipeline and multi-type runs

pub mod batch;
pub mod deleter;
pub mod error;
pub mod orchestrator;

pub use batch::{plan_batches, validate_batch_size, MAX_CONCURRENT_DELETES};
pub use deleter::delete_batch;
pub use error::{aggregate, DeleteFailure, MultiError, NukeError, NukeResult, RunError};
pub use orchestrator::{Orchestrator, ResourceTypeReport, RunOutcome, RunPhase, RunReport};
