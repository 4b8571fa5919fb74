//! Mutex and its acquisition activity (spec §3, §4.D "Mutex").

use std::collections::VecDeque;

use crate::activity::{ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::error::KernelError;
use crate::util::{ActivityId, ActorId, MutexId};

/// The mutex kernel object: an ownership slot plus an ordered wait queue of
/// acquisition activities.
pub struct Mutex {
    pub queue: VecDeque<ActivityId>,
    pub owner: Option<ActorId>,
    pub recursive: bool,
    pub depth: u32,
}

impl Mutex {
    pub fn new(recursive: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            owner: None,
            recursive,
            depth: 0,
        }
    }
}

/// Acquisition ticket created by [`lock_async`] (spec §3 "Mutex acquisition").
pub struct MutexAcqBody {
    pub header: ActivityHeader,
    pub mutex: MutexId,
    pub issuer: ActorId,
    pub granted: bool,
    pub depth: u32,
}

fn grant(header: &mut ActivityHeader) {
    header.state = ActivityState::Done;
}

/// `lock_async(issuer) → acquisition` (spec §4.D).
pub fn lock_async(engine: &mut EngineInner, mutex_id: MutexId, issuer: ActorId) -> ActivityId {
    let mutex = engine.mutexes.get_mut(mutex_id).expect("lock_async on unknown mutex");

    if mutex.recursive && mutex.owner == Some(issuer) {
        mutex.depth += 1;
        let depth = mutex.depth;
        return new_acquisition(engine, mutex_id, issuer, true, depth);
    }

    if mutex.owner.is_none() {
        mutex.owner = Some(issuer);
        mutex.depth = 1;
        return new_acquisition(engine, mutex_id, issuer, true, 1);
    }

    if mutex.recursive {
        if let Some(&pending_id) = mutex.queue.iter().find(|&&id| {
            engine
                .activities
                .get(id)
                .map(|a| matches!(a, ActivityRecord::MutexAcq(b) if b.issuer == issuer))
                .unwrap_or(false)
        }) {
            if let Some(ActivityRecord::MutexAcq(body)) = engine.activities.get_mut(pending_id) {
                body.depth += 1;
                return pending_id;
            }
        }
    }

    new_acquisition(engine, mutex_id, issuer, false, 1)
}

fn new_acquisition(engine: &mut EngineInner, mutex_id: MutexId, issuer: ActorId, granted: bool, depth: u32) -> ActivityId {
    let mut header = ActivityHeader::new();
    header.state = ActivityState::Started;
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    if granted {
        grant(&mut header);
    }
    let body = MutexAcqBody {
        header,
        mutex: mutex_id,
        issuer,
        granted,
        depth,
    };
    let id = engine.activities.insert(ActivityRecord::MutexAcq(body));
    if !granted {
        engine.mutexes.get_mut(mutex_id).expect("checked above").queue.push_back(id);
    }
    engine.own_activity(issuer, id);
    id
}

/// `try_lock(issuer) → bool` (spec §4.D): same semantics without queueing.
pub fn try_lock(engine: &mut EngineInner, mutex_id: MutexId, issuer: ActorId) -> bool {
    let mutex = engine.mutexes.get_mut(mutex_id).expect("try_lock on unknown mutex");
    if mutex.recursive && mutex.owner == Some(issuer) {
        mutex.depth += 1;
        true
    } else if mutex.owner.is_none() {
        mutex.owner = Some(issuer);
        mutex.depth = 1;
        true
    } else {
        false
    }
}

/// `unlock(issuer)` (spec §4.D). Asserts `issuer == owner`.
pub fn unlock(engine: &mut EngineInner, mutex_id: MutexId, issuer: ActorId) -> Result<(), KernelError> {
    let mutex = engine.mutexes.get_mut(mutex_id).expect("unlock on unknown mutex");
    if mutex.owner != Some(issuer) {
        return Err(KernelError::Assertion(format!(
            "unlock of mutex {mutex_id} by non-owner"
        )));
    }

    if mutex.recursive {
        mutex.depth -= 1;
        if mutex.depth > 0 {
            return Ok(());
        }
    }

    if let Some(next_id) = mutex.queue.pop_front() {
        let (next_issuer, next_depth) = match engine.activities.get(next_id) {
            Some(ActivityRecord::MutexAcq(b)) => (b.issuer, b.depth),
            _ => unreachable!("mutex queue referenced a non-acquisition activity"),
        };
        let mutex = engine.mutexes.get_mut(mutex_id).expect("checked above");
        mutex.owner = Some(next_issuer);
        mutex.depth = next_depth;

        if let Some(ActivityRecord::MutexAcq(body)) = engine.activities.get_mut(next_id) {
            body.granted = true;
            grant(&mut body.header);
        }
        let was_waited = engine
            .activities
            .get(next_id)
            .map(|a| !a.header().waiters.is_empty())
            .unwrap_or(false);
        if was_waited {
            crate::activity::finish(engine, next_id);
        }
    } else {
        let mutex = engine.mutexes.get_mut(mutex_id).expect("checked above");
        mutex.owner = None;
        mutex.depth = 0;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    fn engine_with_mutex(recursive: bool) -> (Engine, MutexId) {
        let engine = Engine::new_for_tests();
        let id = engine.with_inner_mut(|inner| inner.mutexes.insert(Mutex::new(recursive)));
        (engine, id)
    }

    #[test]
    fn second_locker_is_queued_not_granted() {
        let (engine, mutex_id) = engine_with_mutex(false);
        engine.with_inner_mut(|inner| {
            let a1 = inner.spawn_bare_actor();
            let a2 = inner.spawn_bare_actor();
            let acq1 = lock_async(inner, mutex_id, a1);
            let acq2 = lock_async(inner, mutex_id, a2);
            assert_eq!(inner.activities.get(acq1).unwrap().state(), ActivityState::Done);
            assert_eq!(inner.activities.get(acq2).unwrap().state(), ActivityState::Started);
        });
    }

    #[test]
    fn unlock_with_no_contention_restores_initial_state() {
        let (engine, mutex_id) = engine_with_mutex(false);
        engine.with_inner_mut(|inner| {
            let a1 = inner.spawn_bare_actor();
            lock_async(inner, mutex_id, a1);
            unlock(inner, mutex_id, a1).unwrap();
            assert!(inner.mutexes.get(mutex_id).unwrap().owner.is_none());
        });
    }

    #[test]
    fn unlock_by_non_owner_is_rejected() {
        let (engine, mutex_id) = engine_with_mutex(false);
        engine.with_inner_mut(|inner| {
            let a1 = inner.spawn_bare_actor();
            let a2 = inner.spawn_bare_actor();
            lock_async(inner, mutex_id, a1);
            assert!(unlock(inner, mutex_id, a2).is_err());
        });
    }

    #[test]
    fn recursive_mutex_tracks_depth() {
        let (engine, mutex_id) = engine_with_mutex(true);
        engine.with_inner_mut(|inner| {
            let a1 = inner.spawn_bare_actor();
            lock_async(inner, mutex_id, a1);
            lock_async(inner, mutex_id, a1);
            assert_eq!(inner.mutexes.get(mutex_id).unwrap().depth, 2);
            unlock(inner, mutex_id, a1).unwrap();
            assert_eq!(inner.mutexes.get(mutex_id).unwrap().owner, Some(a1));
            unlock(inner, mutex_id, a1).unwrap();
            assert!(inner.mutexes.get(mutex_id).unwrap().owner.is_none());
        });
    }
}
