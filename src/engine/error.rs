//! Engine error kinds and failure aggregation

use crate::resource::Scope;
use std::fmt;
use thiserror::Error;

/// Result type for engine operations
pub type NukeResult<T> = Result<T, NukeError>;

/// Errors surfaced by the nuke engine
#[derive(Debug, Error)]
pub enum NukeError {
    /// Enumerating candidates failed; nothing was filtered or deleted
    #[error("failed to list {resource_type} in {scope}: {source:#}")]
    Listing {
        resource_type: String,
        scope: String,
        #[source]
        source: anyhow::Error,
    },

    /// A single deletion call was handed more identifiers than the safety ceiling
    #[error("too many {resource_type} requested at once ({requested} > {limit}); halting to avoid API rate limiting")]
    TooManyIdentifiers {
        resource_type: String,
        requested: usize,
        limit: usize,
    },

    /// Plugin declared a batch size the engine cannot honour
    #[error("invalid max batch size {size} for {resource_type} (must be between 1 and {limit})")]
    InvalidBatchSize {
        resource_type: String,
        size: usize,
        limit: usize,
    },

    /// One or more per-identifier deletions failed
    #[error(transparent)]
    Deletion(#[from] MultiError),

    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("resource type registered twice: {0}")]
    DuplicateResourceType(String),
}

impl NukeError {
    /// Per-identifier failures carried by this error, if any
    pub fn failures(&self) -> &[DeleteFailure] {
        match self {
            NukeError::Deletion(multi) => multi.failures(),
            _ => &[],
        }
    }
}

/// One identifier whose deletion failed
#[derive(Debug)]
pub struct DeleteFailure {
    pub identifier: String,
    pub source: anyhow::Error,
}

impl DeleteFailure {
    pub fn new(identifier: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            identifier: identifier.into(),
            source,
        }
    }
}

impl fmt::Display for DeleteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.identifier, self.source)
    }
}

/// Ordered collection of per-identifier failures.
///
/// Failures keep the order they were added in and are never merged, even when
/// two identifiers fail with the same message.
#[derive(Debug, Default)]
pub struct MultiError {
    failures: Vec<DeleteFailure>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every failure of `other` after the current ones
    pub fn extend(&mut self, other: MultiError) {
        self.failures.extend(other.failures);
    }

    pub fn failures(&self) -> &[DeleteFailure] {
        &self.failures
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.identifier.as_str())
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// `None` when nothing failed
    pub fn into_option(self) -> Option<MultiError> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.failures.len() == 1 { "error" } else { "errors" };
        write!(f, "{} {} occurred:", self.failures.len(), noun)?;
        for failure in &self.failures {
            write!(f, "\n\t* {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl IntoIterator for MultiError {
    type Item = DeleteFailure;
    type IntoIter = std::vec::IntoIter<DeleteFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

impl FromIterator<DeleteFailure> for MultiError {
    fn from_iter<I: IntoIterator<Item = DeleteFailure>>(iter: I) -> Self {
        Self {
            failures: iter.into_iter().collect(),
        }
    }
}

/// Every failed (resource type, scope) of a run
#[derive(Debug, Default)]
pub struct RunError {
    errors: Vec<(String, Scope, NukeError)>,
}

impl RunError {
    pub fn push(&mut self, resource_type: impl Into<String>, scope: Scope, error: NukeError) {
        self.errors.push((resource_type.into(), scope, error));
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), RunError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} resource type run(s) failed:", self.errors.len())?;
        for (resource_type, scope, error) in &self.errors {
            let text = error.to_string().replace('\n', "\n  ");
            write!(f, "\n[{} in {}] {}", resource_type, scope, text)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {}

/// Merge per-identifier outcomes into one composite error.
///
/// Outcomes are `(identifier, result)` pairs in dispatch order; the returned
/// error lists every failure in that same order.
pub fn aggregate<I, S>(outcomes: I) -> Option<MultiError>
where
    I: IntoIterator<Item = (S, anyhow::Result<()>)>,
    S: Into<String>,
{
    outcomes
        .into_iter()
        .filter_map(|(identifier, result)| {
            result.err().map(|e| DeleteFailure::new(identifier, e))
        })
        .collect::<MultiError>()
        .into_option()
}
