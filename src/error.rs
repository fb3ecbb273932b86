//! Engine-wide error types.
//!
//! Mirrors the error kinds enumerated in the design's error-handling section:
//! each maps to one `thiserror` variant, plus a catch-all `Storage` variant
//! for the value-store / row-arena failure paths.

use crate::ids::{EId, VId};

/// Top-level engine error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// A read found nothing visible. Benign for reads; fatal context-dependent
    /// for writers (callers decide).
    #[error("not found")]
    NotFound,

    /// An MVCC append observed another transaction's uncommitted tail.
    #[error("write conflict on append (trx {conflicting_trx})")]
    WriteConflict { conflicting_trx: u64 },

    /// A mutation's anchor vertex/edge was not visible to the transaction's
    /// begin-ts.
    #[error("invisible input: vertex {0:?} not visible")]
    InvisibleInput(VId),

    /// A mutation targeted an edge endpoint that is not visible.
    #[error("invisible edge input: {0:?}")]
    InvisibleEdgeInput(EId),

    /// Step-level validation found a conflicting committed peer.
    #[error("validation conflict with trx {0}")]
    ValidationConflict(u64),

    /// A homogeneous/heterogeneous dependency resolved against this
    /// transaction.
    #[error("dependency violation against trx {0}")]
    DependencyViolation(u64),

    /// Malformed message or unknown operator kind. Fatal, not recoverable by
    /// retry.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// Value store / row arena / MVCC pool failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A placeholder fill found a result count that does not match what the
    /// target operator requires (e.g. `ADDE` requires exactly one value).
    #[error("placeholder resolution failed: {0}")]
    PlaceholderMismatch(String),

    /// The optimistic validation wait loop exceeded its iteration budget.
    #[error("optimistic validation timed out")]
    OptimisticTimeout,
}

/// Result of a storage read operation (spec's `READ_STAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Success,
    NotFound,
    Abort,
}

/// Result of a storage write operation (spec's `PROCESS_STAT`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Success,
    AbortWriteConflict,
    AbortInvisibleInput,
    AbortValidation,
}

impl ProcessStatus {
    pub fn is_abort(&self) -> bool {
        !matches!(self, ProcessStatus::Success)
    }
}

impl From<&EngineError> for ProcessStatus {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::WriteConflict { .. } => ProcessStatus::AbortWriteConflict,
            EngineError::InvisibleInput(_) | EngineError::InvisibleEdgeInput(_) => ProcessStatus::AbortInvisibleInput,
            EngineError::ValidationConflict(_) | EngineError::DependencyViolation(_) => ProcessStatus::AbortValidation,
            _ => ProcessStatus::AbortWriteConflict,
        }
    }
}
