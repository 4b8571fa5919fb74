//! The tagged activity variant and its shared operations (spec §4.C, §9
//! "Virtual inheritance over ActivityImpl").
//!
//! Every operation here is a free function taking `&mut EngineInner`
//! explicitly, per the "Global state" design note in spec §9: there is no
//! dynamic dispatch across a plugin boundary, because the set of activity
//! kinds is closed.

use crate::activity::state::ActivityState;
use crate::comm::{CommBody, MessBody};
use crate::engine::EngineInner;
use crate::error::KernelError;
use crate::exec::{ExecBody, IoBody, SleepBody};
use crate::sync::{BarrierAcqBody, CondvarAcqBody, MutexAcqBody, SemAcqBody};
use crate::time::SimTime;
use crate::util::{ActivityId, ActorId, TimerId};

/// One registered waiter on an activity: the actor that issued `wait_for`
/// or `wait_any_for`, plus the timer (if any) that will time it out.
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    pub issuer: ActorId,
    pub timeout_timer: Option<TimerId>,
}

/// Fields shared by every activity kind (spec §3 "Activity").
#[derive(Debug, Default)]
pub struct ActivityHeader {
    pub state: ActivityState,
    pub waiters: Vec<Waiter>,
    pub owner: Option<ActorId>,
    pub start_time: Option<SimTime>,
    pub finish_time: Option<SimTime>,
    pub refcount: u32,
}

impl Default for ActivityState {
    fn default() -> Self {
        ActivityState::Inited
    }
}

impl ActivityHeader {
    pub fn new() -> Self {
        Self {
            state: ActivityState::Inited,
            waiters: Vec::new(),
            owner: None,
            start_time: None,
            finish_time: None,
            refcount: 0,
        }
    }
}

/// The closed set of activity kinds (spec §9: "tagged variant... no need
/// for late binding across a plugin boundary").
pub enum ActivityRecord {
    Comm(CommBody),
    Mess(MessBody),
    Exec(ExecBody),
    Io(IoBody),
    Sleep(SleepBody),
    MutexAcq(MutexAcqBody),
    SemAcq(SemAcqBody),
    BarrierAcq(BarrierAcqBody),
    CondvarAcq(CondvarAcqBody),
}

impl ActivityRecord {
    pub fn header(&self) -> &ActivityHeader {
        match self {
            ActivityRecord::Comm(b) => &b.header,
            ActivityRecord::Mess(b) => &b.header,
            ActivityRecord::Exec(b) => &b.header,
            ActivityRecord::Io(b) => &b.header,
            ActivityRecord::Sleep(b) => &b.header,
            ActivityRecord::MutexAcq(b) => &b.header,
            ActivityRecord::SemAcq(b) => &b.header,
            ActivityRecord::BarrierAcq(b) => &b.header,
            ActivityRecord::CondvarAcq(b) => &b.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut ActivityHeader {
        match self {
            ActivityRecord::Comm(b) => &mut b.header,
            ActivityRecord::Mess(b) => &mut b.header,
            ActivityRecord::Exec(b) => &mut b.header,
            ActivityRecord::Io(b) => &mut b.header,
            ActivityRecord::Sleep(b) => &mut b.header,
            ActivityRecord::MutexAcq(b) => &mut b.header,
            ActivityRecord::SemAcq(b) => &mut b.header,
            ActivityRecord::BarrierAcq(b) => &mut b.header,
            ActivityRecord::CondvarAcq(b) => &mut b.header,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.header().state
    }
}

/// Cancel and drop the resource action backing `activity`, if it has one
/// (spec §3 invariant 1: "in any terminal state the action has been
/// released and set to null"). Sync acquisitions and `Mess` never hold an
/// action, so this is a no-op for them.
fn release_action(activity: &mut ActivityRecord) {
    match activity {
        ActivityRecord::Comm(b) => {
            if let Some(mut action) = b.action.take() {
                action.cancel();
            }
        }
        ActivityRecord::Exec(b) => {
            if let Some(mut action) = b.action.take() {
                action.cancel();
            }
        }
        ActivityRecord::Io(b) => {
            if let Some(mut action) = b.action.take() {
                action.cancel();
            }
        }
        ActivityRecord::Sleep(b) => {
            if let Some(mut action) = b.action.take() {
                action.cancel();
            }
        }
        ActivityRecord::Mess(_)
        | ActivityRecord::MutexAcq(_)
        | ActivityRecord::SemAcq(_)
        | ActivityRecord::BarrierAcq(_)
        | ActivityRecord::CondvarAcq(_) => {}
    }
}

/// Map a terminal [`ActivityState`] to the exception delivered to waiters
/// (spec §7). `Done` activities deliver no exception.
fn exception_for(id: ActivityId, state: ActivityState) -> Option<KernelError> {
    match state {
        ActivityState::Done => None,
        ActivityState::Canceled => Some(KernelError::Cancel(id)),
        ActivityState::Timeout | ActivityState::SrcTimeout | ActivityState::DstTimeout => {
            Some(KernelError::Timeout(id))
        }
        ActivityState::SrcHostFailure | ActivityState::DstHostFailure => {
            Some(KernelError::HostFailure(id))
        }
        ActivityState::LinkFailure => Some(KernelError::NetworkFailure(id)),
        ActivityState::Failed => Some(KernelError::StorageFailure(id)),
        ActivityState::Inited | ActivityState::Starting | ActivityState::Started | ActivityState::Waiting | ActivityState::Ready => {
            unreachable!("exception_for called on a non-terminal state")
        }
    }
}

/// `finish()` (spec §4.C): choose nothing here (each kind already decided its
/// terminal state before calling this), release resources, walk waiters and
/// deliver exceptions, schedule each waiter to run next round.
///
/// Kind-specific pre-work (choosing the terminal state, releasing the
/// resource action, detaching from a mailbox/queue, running `copy_data()`)
/// happens in each kind's own `finish_*` function *before* this is called;
/// this function is the shared tail every one of them ends with.
pub fn finish(engine: &mut EngineInner, id: ActivityId) {
    let state = match engine.activities.get(id) {
        Some(a) => a.state(),
        None => return,
    };
    debug_assert!(state.is_terminal(), "finish() called on a non-terminal activity");

    let waiters = std::mem::take(&mut engine.activities.get_mut(id).expect("checked above").header_mut().waiters);
    engine.activities.get_mut(id).expect("checked above").header_mut().finish_time = Some(engine.now);

    for waiter in waiters {
        if let Some(timer) = waiter.timeout_timer {
            engine.timers.cancel(timer);
        }
        engine.forget_waiting_on(waiter.issuer, id);
        engine.clear_wait_any_peer(waiter.issuer, id);
        let exception = exception_for(id, state);
        engine.deliver_and_wake(waiter.issuer, exception);
    }

    tracing::trace!(activity = id.serial(), ?state, "activity finished");
}

/// `wait_for(issuer, timeout)` (spec §4.C).
pub fn wait_for(engine: &mut EngineInner, id: ActivityId, issuer: ActorId, timeout: Option<SimTime>) {
    let state = engine.activities.get(id).expect("wait_for on unknown activity").state();
    if state.is_terminal() {
        finish_issuer_immediately(engine, id, issuer);
        return;
    }

    let timeout_timer = timeout.map(|after| {
        let fire_at = engine.now + after;
        engine.schedule_timeout(fire_at, id, issuer)
    });

    engine
        .activities
        .get_mut(id)
        .expect("checked above")
        .header_mut()
        .waiters
        .push(Waiter { issuer, timeout_timer });
}

/// When `wait_for` is issued against an already-terminal activity, the
/// issuer is answered in the same kernel step rather than being registered
/// as a waiter (spec §4.C: "if already terminal, run `finish()` immediately").
fn finish_issuer_immediately(engine: &mut EngineInner, id: ActivityId, issuer: ActorId) {
    let state = engine.activities.get(id).expect("checked by caller").state();
    let exception = exception_for(id, state);
    engine.deliver_and_wake(issuer, exception);
}

/// `wait_any_for(issuer, activities, timeout)` (spec §4.C).
///
/// Returns the index (within `activities`) of the one that was already
/// terminal, if any, so the caller can answer the simcall in the same step.
pub fn wait_any_for(
    engine: &mut EngineInner,
    activities: &[ActivityId],
    issuer: ActorId,
    timeout: Option<SimTime>,
) -> Option<usize> {
    for (index, &id) in activities.iter().enumerate() {
        if engine.activities.get(id).expect("unknown activity in wait_any set").state().is_terminal() {
            return Some(index);
        }
    }

    let timeout_timer = timeout.map(|after| {
        let fire_at = engine.now + after;
        engine.schedule_wait_any_timeout(fire_at, activities.to_vec(), issuer)
    });

    for &id in activities {
        engine
            .activities
            .get_mut(id)
            .expect("checked above")
            .header_mut()
            .waiters
            .push(Waiter { issuer, timeout_timer });
    }
    engine.register_wait_any(issuer, activities.to_vec());
    None
}

/// `test(issuer)` (spec §4.C): non-blocking. If terminal, finishes it and
/// reports true; otherwise reports false without side effects.
pub fn test(engine: &mut EngineInner, id: ActivityId, issuer: ActorId) -> bool {
    let state = engine.activities.get(id).expect("test on unknown activity").state();
    if state.is_terminal() {
        finish_issuer_immediately(engine, id, issuer);
        true
    } else {
        false
    }
}

/// `test_any(issuer, activities)` (spec §4.C): linear scan, first terminal
/// activity wins.
pub fn test_any(engine: &mut EngineInner, activities: &[ActivityId], issuer: ActorId) -> i64 {
    for (index, &id) in activities.iter().enumerate() {
        if test(engine, id, issuer) {
            return index as i64;
        }
    }
    -1
}

/// `cancel()` (spec §4.C). A no-op on an already-terminal activity (spec §8
/// round-trip property).
///
/// A matched-but-not-yet-finished `Comm` has a `partner` half waiting on its
/// own, separate activity id (spec §4.E "become the matched pair"); canceling
/// one drags the other down with it so neither side is left parked forever.
pub fn cancel(engine: &mut EngineInner, id: ActivityId) {
    let Some(activity) = engine.activities.get_mut(id) else {
        return;
    };
    if activity.header().state.is_terminal() {
        return;
    }
    activity.header_mut().state = ActivityState::Canceled;
    release_action(activity);
    let partner = match activity {
        ActivityRecord::Comm(b) => b.partner.take(),
        _ => None,
    };
    if let Some(owner) = activity.header().owner {
        engine.remove_owned_activity(owner, id);
    }
    finish(engine, id);
    if let Some(partner_id) = partner {
        cancel(engine, partner_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_state_has_no_exception() {
        let arena: crate::util::arena::Arena<(), crate::util::ids::ActivityMarker> =
            crate::util::arena::Arena::new();
        let id = {
            let mut a = arena;
            a.insert(())
        };
        assert!(exception_for(id, ActivityState::Done).is_none());
    }

    #[test]
    fn canceled_state_yields_cancel_exception() {
        let mut arena: crate::util::arena::Arena<(), crate::util::ids::ActivityMarker> =
            crate::util::arena::Arena::new();
        let id = arena.insert(());
        assert!(matches!(exception_for(id, ActivityState::Canceled), Some(KernelError::Cancel(_))));
    }
}
