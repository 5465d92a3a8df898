//! Error taxonomy for flowctl
//!
//! Per spec.md §7, most failure modes here are *not* errors: admission
//! rejection, allocation exhaustion and handler failure are reported
//! through return values (`bool`/`u32`/state transitions) because the
//! caller is expected to handle them as routine control flow. This type
//! covers only the genuinely exceptional cases: invariant violations
//! that must not be silently tolerated, and row-validation failures from
//! the database-adapter boundary.

use core::fmt;

/// Result type for the rare operations that can fail outright.
pub type CtlResult<T> = Result<T, CtlError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtlError {
    /// `alloc_specified` was called with `start == 0`, which can never
    /// be part of a valid range (spec.md §9 open question).
    InvalidAllocation,

    /// The allocator's byte-accounting invariant
    /// (`|allocations| == sum of owners[u].n`) no longer holds. This is
    /// the one condition spec.md §7 calls fatal rather than tolerable.
    AllocatorInvariantBroken,

    /// A database row could not be parsed into the in-memory
    /// representation an adapter node expects. Recoverable: the row is
    /// skipped and the caller should rate-limit the accompanying log.
    RowValidation(String),

    /// `EngineBuilder::build` rejected the declared graph: either a
    /// node exceeded `MAX_INPUT` or the declared edges contain a
    /// cycle. Both are programmer errors caught before the engine
    /// ever runs, not routine control flow.
    EngineBuild(String),
}

impl fmt::Display for CtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtlError::InvalidAllocation => write!(f, "alloc_specified called with start == 0"),
            CtlError::AllocatorInvariantBroken => {
                write!(f, "conjunction-id allocator invariant broken")
            }
            CtlError::RowValidation(msg) => write!(f, "row validation failed: {msg}"),
            CtlError::EngineBuild(msg) => write!(f, "engine graph rejected: {msg}"),
        }
    }
}

impl std::error::Error for CtlError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            CtlError::InvalidAllocation.to_string(),
            "alloc_specified called with start == 0"
        );
        assert_eq!(
            CtlError::RowValidation("bad mac".into()).to_string(),
            "row validation failed: bad mac"
        );
    }
}
