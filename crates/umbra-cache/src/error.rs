//! Negative cache error types.

use thiserror::Error;

/// Errors surfaced by the negative cache.
///
/// Ingest is fire-and-forget and never surfaces errors; synthesis
/// distinguishes "no proof available" (`Ok(None)`) from a genuine
/// failure to assemble a reply, which is the only error that crosses
/// the public boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A reply could not be assembled for lack of resources.
    #[error("out of resources while assembling reply: {0}")]
    Exhausted(&'static str),
}

/// Result type alias for negative cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Outcome of a DLV-style existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlvOutcome {
    /// The cache holds a complete, fresh proof that the name does not
    /// exist.
    ProvenAbsent,
    /// No usable proof; the name may or may not exist.
    NoProof,
}

impl DlvOutcome {
    /// Returns true if absence was proven.
    #[inline]
    pub const fn is_proven(self) -> bool {
        matches!(self, Self::ProvenAbsent)
    }
}
