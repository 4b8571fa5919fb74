//! An actor's position in the scheduler's view of the world (spec §3
//! "Actor", §4.G scheduler loop).

/// Where an actor sits relative to the runnable queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRunState {
    /// Queued to be resumed on the next scheduler pass.
    Runnable,
    /// Parked on one or more activities; will become `Runnable` again when
    /// one of them calls `finish()`.
    Blocked,
    /// Has exited (its body future completed) or was killed; its arena slot
    /// is retained only long enough for `join()`ers to observe the outcome.
    Terminated,
}

/// What to do when an actor's host reboots (spec §4.G "Restart policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// The actor is gone for good; the host reboot does not respawn it.
    Never,
    /// A fresh actor is spawned with the same name and code, with an
    /// incremented restart counter (spec §4.G).
    Always,
}
