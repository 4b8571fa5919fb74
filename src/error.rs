//! Kernel error taxonomy (spec §7).
//!
//! Exceptions are delivered to a waiting actor by being stored in its
//! `exception` slot before it is made runnable again; the simcall wrapper
//! that resumed the actor inspects the slot on return and propagates it
//! through `Result`. [`ForcefulKill`] is deliberately **not** part of this
//! enum: it is not delivered through a simcall result, it unwinds the
//! actor's own future when the actor itself has been killed, so that `Drop`
//! impls up the call stack still run (spec §4.A, §7).

use thiserror::Error;

use crate::util::ActivityId;

/// Recoverable/reportable kernel error kinds (spec §7 table, rows 1-5 and 7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Waited on an activity that was canceled.
    #[error("activity {0} was canceled")]
    Cancel(ActivityId),

    /// A wait timer expired before the activity completed.
    #[error("wait on activity {0} timed out")]
    Timeout(ActivityId),

    /// The host running an exec/sleep activity went down.
    #[error("host failure affecting activity {0}")]
    HostFailure(ActivityId),

    /// A comm failed because of a link or remote-peer failure.
    #[error("network failure affecting activity {0}")]
    NetworkFailure(ActivityId),

    /// An I/O activity failed because its disk action failed.
    #[error("storage failure affecting activity {0}")]
    StorageFailure(ActivityId),

    /// A kernel invariant was violated (e.g. unlock of an unowned mutex).
    ///
    /// Not recoverable: this indicates a programming error in user code or a
    /// bug in the kernel itself, not a simulated platform failure.
    #[error("kernel assertion violated: {0}")]
    Assertion(String),
}

impl KernelError {
    /// Whether user code is expected to be able to recover from this error
    /// (spec §7 "Recoverable?" column) as opposed to `Assertion`, which
    /// signals a programmer error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, KernelError::Assertion(_))
    }
}

/// Unwinds an actor's own future when the actor has been killed.
///
/// This is intentionally not a [`std::error::Error`] and is never wrapped in
/// a `Result` returned from a simcall: its only job is to run to completion
/// once raised, propagating past every `?` an actor body might place in its
/// way, so that RAII guards (held mutexes, open activities) clean up exactly
/// as they would on an ordinary early return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForcefulKill;

impl std::fmt::Display for ForcefulKill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor was forcefully killed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::arena::Arena;

    struct Marker;

    #[test]
    fn assertion_is_not_recoverable() {
        let err = KernelError::Assertion("unlock of unowned mutex".into());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn cancel_is_recoverable() {
        let mut arena: Arena<(), crate::util::ids::ActivityMarker> = Arena::new();
        let id = arena.insert(());
        let err = KernelError::Cancel(id);
        assert!(err.is_recoverable());
        let _ = Marker; // silence unused-marker warning if any
    }

    #[test]
    fn display_mentions_kind() {
        let mut arena: Arena<(), crate::util::ids::ActivityMarker> = Arena::new();
        let id = arena.insert(());
        let err = KernelError::Timeout(id);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn forceful_kill_display() {
        assert_eq!(ForcefulKill.to_string(), "actor was forcefully killed");
    }
}
