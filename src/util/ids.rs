//! Typed identifiers for every arena-backed kernel object.
//!
//! Each id is a distinct instantiation of [`crate::util::arena::Id`] over a
//! zero-sized marker type, so an `ActorId` and a `MailboxId` are different
//! types even though they share an underlying representation — passing one
//! where the other is expected is a compile error, not a runtime bug.

use crate::util::arena::Id;

/// Marker type for [`ActorId`].
pub struct ActorMarker;
/// Unique identifier for an actor, stamped from the engine's actor arena.
pub type ActorId = Id<ActorMarker>;

/// Marker type for [`ActivityId`].
pub struct ActivityMarker;
/// Unique identifier for an activity (any kind: comm, exec, io, sleep, mess,
/// or a synchronization acquisition).
pub type ActivityId = Id<ActivityMarker>;

/// Marker type for [`MailboxId`].
pub struct MailboxMarker;
/// Unique identifier for a mailbox, independent of its user-facing name.
pub type MailboxId = Id<MailboxMarker>;

/// Marker type for [`MessageQueueId`].
pub struct MessageQueueMarker;
/// Unique identifier for a message queue.
pub type MessageQueueId = Id<MessageQueueMarker>;

/// Marker type for [`MutexId`].
pub struct MutexMarker;
/// Unique identifier for a mutex.
pub type MutexId = Id<MutexMarker>;

/// Marker type for [`SemaphoreId`].
pub struct SemaphoreMarker;
/// Unique identifier for a semaphore.
pub type SemaphoreId = Id<SemaphoreMarker>;

/// Marker type for [`BarrierId`].
pub struct BarrierMarker;
/// Unique identifier for a barrier.
pub type BarrierId = Id<BarrierMarker>;

/// Marker type for [`CondvarId`].
pub struct CondvarMarker;
/// Unique identifier for a condition variable.
pub type CondvarId = Id<CondvarMarker>;

/// Marker type for [`HostId`].
pub struct HostMarker;
/// Unique identifier for a host (opaque to the kernel; owned by the
/// platform/resource model, threaded through as a plain key).
pub type HostId = Id<HostMarker>;

/// Marker type for [`TimerId`].
pub struct TimerMarker;
/// Handle returned by [`crate::time::TimerHeap::set`].
pub type TimerId = Id<TimerMarker>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::arena::Arena;

    #[test]
    fn ids_of_different_kinds_do_not_compare() {
        let mut actors: Arena<(), ActorMarker> = Arena::new();
        let mut mailboxes: Arena<(), MailboxMarker> = Arena::new();
        let a = actors.insert(());
        let m = mailboxes.insert(());
        // `a` and `m` are different types; this just documents that the
        // compiler, not a runtime check, rejects `a == m`.
        assert_eq!(a.serial(), 0);
        assert_eq!(m.serial(), 0);
    }
}
