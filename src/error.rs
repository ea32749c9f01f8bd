//! Engine error types
//!
//! Most error conditions described by the spec (unsupported opcode, missing
//! shadow, divergence recovery, mean-value sum overflow, report write
//! failure) are handled locally by the handler that noticed them and never
//! surface here — see each module's `tracing::warn!`/`tracing::debug!` call
//! sites. [`EngineError`] only covers host-facing API misuse: requests the
//! engine cannot honor at all.

use thiserror::Error;

use crate::ir::{Addr, RegOffset, Temp};

/// Errors the engine can report back to its host.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A register offset outside the configured register-file capacity was used.
    #[error("register offset {0:?} is out of range")]
    RegisterOffsetOutOfRange(RegOffset),

    /// A temp index outside the configured temp-array capacity was used.
    #[error("temp index {0:?} is out of range")]
    TempOutOfRange(Temp),

    /// A client request referenced a stage id that was never begun.
    #[error("stage {0} is not active")]
    StageNotActive(u32),

    /// `BEGIN_STAGE` was issued twice for the same id without a matching `END_STAGE`.
    #[error("stage {0} is already active")]
    StageAlreadyActive(u32),

    /// A client request carried arguments inconsistent with its own contract.
    #[error("invalid client request: {0}")]
    InvalidClientRequest(String),

    /// An internal invariant the engine assumes was violated (bad tag, handler
    /// fallthrough). Not expected to be recoverable; surfaced rather than
    /// panicking so a host can decide how to fail.
    #[error("unreachable invariant violated: {0}")]
    UnreachableInvariant(String),

    /// A report could not be created or written.
    #[error("report I/O error: {0}")]
    ReportIo(#[from] std::io::Error),
}

/// Convenience alias used throughout the engine's public API.
pub type EngineResult<T> = Result<T, EngineError>;

/// A guest address paired with the [`EngineError`] that occurred while
/// servicing it, used by [`crate::reports`] to annotate failures without
/// aborting the run.
#[derive(Debug, Error)]
#[error("at {addr:#x}: {source}")]
pub struct LocatedError {
    /// Guest instruction address active when the error occurred.
    pub addr: Addr,
    /// The underlying error.
    #[source]
    pub source: EngineError,
}
