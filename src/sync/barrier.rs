//! Barrier and its acquisition activity (spec §4.D "Barrier").

use std::collections::VecDeque;

use crate::activity::{ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::util::{ActivityId, ActorId, BarrierId};

/// The barrier kernel object: rearms itself once `expected_count` parties
/// have arrived.
pub struct Barrier {
    pub expected_count: usize,
    pub queue: VecDeque<ActivityId>,
}

impl Barrier {
    pub fn new(expected_count: usize) -> Self {
        Self {
            expected_count,
            queue: VecDeque::new(),
        }
    }
}

/// Acquisition ticket created by [`acquire_async`].
pub struct BarrierAcqBody {
    pub header: ActivityHeader,
    pub barrier: BarrierId,
    pub issuer: ActorId,
    pub granted: bool,
}

/// `acquire_async(issuer)` (spec §4.D): queue until `expected_count - 1`
/// others are waiting, then release everyone at once and rearm.
///
/// Mutex/barrier acquisition timeouts are refused at the API boundary
/// (spec §9 open question 1): there is deliberately no `wait_for` overload
/// taking a timeout for a `BarrierAcqBody`.
pub fn acquire_async(engine: &mut EngineInner, barrier_id: BarrierId, issuer: ActorId) -> ActivityId {
    let barrier = engine.barriers.get_mut(barrier_id).expect("acquire_async on unknown barrier");
    let will_release_all = barrier.queue.len() + 1 >= barrier.expected_count;

    let mut header = ActivityHeader::new();
    header.state = ActivityState::Started;
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    let body = BarrierAcqBody {
        header,
        barrier: barrier_id,
        issuer,
        granted: false,
    };
    let id = engine.activities.insert(ActivityRecord::BarrierAcq(body));
    engine.own_activity(issuer, id);

    if will_release_all {
        let waiting: Vec<ActivityId> = engine
            .barriers
            .get_mut(barrier_id)
            .expect("checked above")
            .queue
            .drain(..)
            .collect();
        for waiting_id in waiting.into_iter().chain(std::iter::once(id)) {
            if let Some(ActivityRecord::BarrierAcq(b)) = engine.activities.get_mut(waiting_id) {
                b.granted = true;
                b.header.state = ActivityState::Done;
            }
            let was_waited = engine
                .activities
                .get(waiting_id)
                .map(|a| !a.header().waiters.is_empty())
                .unwrap_or(false);
            if was_waited {
                crate::activity::finish(engine, waiting_id);
            }
        }
    } else {
        engine.barriers.get_mut(barrier_id).expect("checked above").queue.push_back(id);
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn barrier_releases_all_once_expected_count_reached() {
        let engine = Engine::new_for_tests();
        engine.with_inner_mut(|inner| {
            let barrier_id = inner.barriers.insert(Barrier::new(3));
            let a1 = inner.spawn_bare_actor();
            let a2 = inner.spawn_bare_actor();
            let a3 = inner.spawn_bare_actor();

            let acq1 = acquire_async(inner, barrier_id, a1);
            let acq2 = acquire_async(inner, barrier_id, a2);
            assert_eq!(inner.activities.get(acq1).unwrap().state(), ActivityState::Started);
            assert_eq!(inner.activities.get(acq2).unwrap().state(), ActivityState::Started);

            let acq3 = acquire_async(inner, barrier_id, a3);
            assert_eq!(inner.activities.get(acq1).unwrap().state(), ActivityState::Done);
            assert_eq!(inner.activities.get(acq2).unwrap().state(), ActivityState::Done);
            assert_eq!(inner.activities.get(acq3).unwrap().state(), ActivityState::Done);
            assert!(inner.barriers.get(barrier_id).unwrap().queue.is_empty());
        });
    }
}
