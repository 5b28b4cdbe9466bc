//! Outcome types for the façade (C5).
//!
//! None of these represent a recoverable error in the `std::error::Error`
//! sense: invariant violations abort the process (an `assert!` failure is not
//! something a caller branches on), and the outcomes below are expected
//! control flow -- a correctly written caller must handle all variants, the
//! way it must handle both arms of a `bool`, just with names instead of a
//! boolean whose meaning depends on memory.

use crate::access::RetainedPage;
use crate::platform::Platform;

/// Result of attempting to retain a region for the duration of an access.
#[must_use]
pub enum AccessOutcome<'f, P: Platform> {
    /// The region was retained; the guard must be dropped (or explicitly
    /// released) exactly once.
    Retained(RetainedPage<'f, P>),
    /// The region has already been released; there is nothing left to
    /// retain.
    Released,
    /// The surrounding relocation was aborted while this call was waiting
    /// for an in-progress exclusive claim to resolve.
    Aborted,
}

impl<P: Platform> std::fmt::Debug for AccessOutcome<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessOutcome::Retained(_) => write!(f, "Retained(..)"),
            AccessOutcome::Released => write!(f, "Released"),
            AccessOutcome::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Result of `wait_page_released`.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// `ref_count` reached 0.
    Released,
    /// The surrounding relocation was aborted while waiting.
    Aborted,
}

/// Result of `claim_page`, for callers that want to distinguish "we claimed
/// it" from "something else already happened" without matching on a bare
/// guard type.
#[must_use]
pub enum ClaimOutcome<'f, P: Platform> {
    /// Exclusive ownership was obtained.
    Claimed(crate::access::ClaimedPage<'f, P>),
}

impl<P: Platform> std::fmt::Debug for ClaimOutcome<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimOutcome::Claimed(_) => write!(f, "Claimed(..)"),
        }
    }
}
