//! Error types for the AvanceDB core.

use thiserror::Error;

/// Errors surfaced by the document store and map/reduce executor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AvanceError {
    /// The requested document id does not exist, or exists only as a tombstone.
    #[error("document missing: {id}")]
    DocumentMissing { id: String },

    /// A caller-supplied revision did not match the document's current revision.
    #[error("conflict on {id}: expected rev {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: String,
        actual: String,
    },

    /// A malformed id, revision, or query option.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A map or reduce task raised while evaluating a view.
    #[error("view evaluation failed on shard {shard} for document {doc_id}: {message}")]
    ViewEvaluationError {
        shard: usize,
        doc_id: String,
        message: String,
    },

    /// Allocation or queue-capacity failure.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// An invariant the implementation guarantees was violated. Should be unreachable
    /// outside of tests.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AvanceError>;
