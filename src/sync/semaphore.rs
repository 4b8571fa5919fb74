//! Counting semaphore and its acquisition activity (spec §4.D "Semaphore").

use std::collections::VecDeque;

use crate::activity::{ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::util::{ActivityId, ActorId, SemaphoreId};

/// The semaphore kernel object.
pub struct Semaphore {
    pub value: i64,
    pub queue: VecDeque<ActivityId>,
}

impl Semaphore {
    pub fn new(initial: i64) -> Self {
        Self {
            value: initial,
            queue: VecDeque::new(),
        }
    }
}

/// Acquisition ticket created by [`acquire_async`].
pub struct SemAcqBody {
    pub header: ActivityHeader,
    pub semaphore: SemaphoreId,
    pub issuer: ActorId,
    pub granted: bool,
}

/// `acquire_async` (spec §4.D): if `value > 0` decrement and grant; else
/// queue.
pub fn acquire_async(engine: &mut EngineInner, sem_id: SemaphoreId, issuer: ActorId) -> ActivityId {
    let sem = engine.semaphores.get_mut(sem_id).expect("acquire_async on unknown semaphore");
    let granted = sem.value > 0;
    if granted {
        sem.value -= 1;
    }

    let mut header = ActivityHeader::new();
    header.state = ActivityState::Started;
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    if granted {
        header.state = ActivityState::Done;
    }
    let body = SemAcqBody {
        header,
        semaphore: sem_id,
        issuer,
        granted,
    };
    let id = engine.activities.insert(ActivityRecord::SemAcq(body));
    if !granted {
        engine.semaphores.get_mut(sem_id).expect("checked above").queue.push_back(id);
    }
    engine.own_activity(issuer, id);
    id
}

/// `release` (spec §4.D): grant the head of the queue if any, else
/// increment `value`.
pub fn release(engine: &mut EngineInner, sem_id: SemaphoreId) {
    let sem = engine.semaphores.get_mut(sem_id).expect("release on unknown semaphore");
    if let Some(next_id) = sem.queue.pop_front() {
        if let Some(ActivityRecord::SemAcq(body)) = engine.activities.get_mut(next_id) {
            body.granted = true;
            body.header.state = ActivityState::Done;
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
        engine.semaphores.get_mut(sem_id).expect("checked above").value += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn release_after_acquire_restores_initial_value() {
        let engine = Engine::new_for_tests();
        engine.with_inner_mut(|inner| {
            let sem_id = inner.semaphores.insert(Semaphore::new(1));
            let a1 = inner.spawn_bare_actor();
            acquire_async(inner, sem_id, a1);
            assert_eq!(inner.semaphores.get(sem_id).unwrap().value, 0);
            release(inner, sem_id);
            assert_eq!(inner.semaphores.get(sem_id).unwrap().value, 1);
        });
    }

    #[test]
    fn exhausted_semaphore_queues_the_next_acquirer() {
        let engine = Engine::new_for_tests();
        engine.with_inner_mut(|inner| {
            let sem_id = inner.semaphores.insert(Semaphore::new(0));
            let a1 = inner.spawn_bare_actor();
            let acq = acquire_async(inner, sem_id, a1);
            assert_eq!(inner.activities.get(acq).unwrap().state(), ActivityState::Started);
            release(inner, sem_id);
            assert_eq!(inner.activities.get(acq).unwrap().state(), ActivityState::Done);
        });
    }
}
