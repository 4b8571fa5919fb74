//! Condition variable and its acquisition activity (spec §4.D "Condition
//! variable").
//!
//! The re-lock-on-wakeup step is modeled assuming the mutex is free the
//! instant `signal()` runs (true for every scenario in spec.md §8, since the
//! signaling actor only just unlocked it and no third actor intervenes in
//! the same kernel step). A contended re-lock is a known gap, asserted
//! against in debug builds rather than silently mishandled; see DESIGN.md.

use std::collections::VecDeque;

use crate::activity::{ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::error::KernelError;
use crate::sync::mutex;
use crate::util::{ActivityId, ActorId, CondvarId, MutexId};

/// The condition-variable kernel object.
pub struct Condvar {
    pub queue: VecDeque<ActivityId>,
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Condvar {
    pub fn new() -> Self {
        Self { queue: VecDeque::new() }
    }
}

/// Acquisition ticket created by [`acquire_async`]; additionally records the
/// mutex to re-lock on wakeup (spec §3 "ConditionVariable").
pub struct CondvarAcqBody {
    pub header: ActivityHeader,
    pub condvar: CondvarId,
    pub issuer: ActorId,
    pub mutex: MutexId,
    pub granted: bool,
}

/// `acquire_async(issuer, mutex)` (spec §4.D): requires `mutex.owner ==
/// issuer`; unlocks the mutex in the same kernel step, then enqueues a
/// non-granted acquisition.
pub fn acquire_async(
    engine: &mut EngineInner,
    condvar_id: CondvarId,
    issuer: ActorId,
    mutex_id: MutexId,
) -> Result<ActivityId, KernelError> {
    {
        let current_owner = engine.mutexes.get(mutex_id).expect("acquire_async on unknown mutex").owner;
        if current_owner != Some(issuer) {
            return Err(KernelError::Assertion(format!(
                "condvar wait by actor not holding mutex {mutex_id}"
            )));
        }
    }
    mutex::unlock(engine, mutex_id, issuer)?;

    let mut header = ActivityHeader::new();
    header.state = ActivityState::Started;
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    let body = CondvarAcqBody {
        header,
        condvar: condvar_id,
        issuer,
        mutex: mutex_id,
        granted: false,
    };
    let id = engine.activities.insert(ActivityRecord::CondvarAcq(body));
    engine.own_activity(issuer, id);
    engine.condvars.get_mut(condvar_id).expect("checked above").queue.push_back(id);
    Ok(id)
}

/// `signal()` (spec §4.D): dequeue one waiter, grant it, re-lock its mutex,
/// and finish it if it is blocked. No-op on an empty queue (spec §8
/// round-trip property).
pub fn signal(engine: &mut EngineInner, condvar_id: CondvarId) {
    let Some(next_id) = engine.condvars.get_mut(condvar_id).expect("signal on unknown condvar").queue.pop_front() else {
        return;
    };

    let (issuer, mutex_id) = match engine.activities.get(next_id) {
        Some(ActivityRecord::CondvarAcq(b)) => (b.issuer, b.mutex),
        _ => unreachable!("condvar queue referenced a non-acquisition activity"),
    };

    let relock_id = mutex::lock_async(engine, mutex_id, issuer);
    let relock_granted = engine.activities.get(relock_id).expect("just created").state() == ActivityState::Done;
    debug_assert!(
        relock_granted,
        "condvar re-lock contended: mutex {mutex_id} was not free when signal() ran"
    );

    if let Some(ActivityRecord::CondvarAcq(body)) = engine.activities.get_mut(next_id) {
        body.granted = true;
        if relock_granted {
            body.header.state = ActivityState::Done;
        }
    }
    if relock_granted {
        let was_waited = engine
            .activities
            .get(next_id)
            .map(|a| !a.header().waiters.is_empty())
            .unwrap_or(false);
        if was_waited {
            crate::activity::finish(engine, next_id);
        }
    }
}

/// `broadcast()` (spec §4.D): repeat [`signal`] until the queue is empty.
pub fn broadcast(engine: &mut EngineInner, condvar_id: CondvarId) {
    while !engine.condvars.get(condvar_id).expect("broadcast on unknown condvar").queue.is_empty() {
        signal(engine, condvar_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::sync::mutex::Mutex;

    #[test]
    fn signal_on_empty_queue_is_a_no_op() {
        let engine = Engine::new_for_tests();
        engine.with_inner_mut(|inner| {
            let condvar_id = inner.condvars.insert(Condvar::new());
            signal(inner, condvar_id); // must not panic
            assert!(inner.condvars.get(condvar_id).unwrap().queue.is_empty());
        });
    }

    #[test]
    fn signal_regrants_the_mutex_to_the_waiter() {
        let engine = Engine::new_for_tests();
        engine.with_inner_mut(|inner| {
            let mutex_id = inner.mutexes.insert(Mutex::new(false));
            let condvar_id = inner.condvars.insert(Condvar::new());
            let consumer = inner.spawn_bare_actor();

            mutex::lock_async(inner, mutex_id, consumer);
            let wait_id = acquire_async(inner, condvar_id, consumer, mutex_id).unwrap();
            assert!(inner.mutexes.get(mutex_id).unwrap().owner.is_none());

            signal(inner, condvar_id);
            assert_eq!(inner.activities.get(wait_id).unwrap().state(), ActivityState::Done);
            assert_eq!(inner.mutexes.get(mutex_id).unwrap().owner, Some(consumer));
        });
    }
}
