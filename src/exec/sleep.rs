//! Sleep activity (spec §4.F "Sleep"): a pure time delay, modeled as a
//! resource action so it composes with host failures like any other action.

use crate::activity::{self, ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::resource::{Action, ActionState, LinearAction, ResourceModel};
use crate::time::SimTime;
use crate::util::{ActivityId, ActorId, HostId};

/// Concrete `Sleep` activity body.
pub struct SleepBody {
    pub header: ActivityHeader,
    pub host: HostId,
    pub duration: SimTime,
    pub action: Option<LinearAction>,
}

/// Construct an INITED sleep activity bound to `issuer` (spec §6.2
/// "Construction (no side effects)"). Call [`start`] to begin consuming the
/// sleep action.
pub fn new_sleep(engine: &mut EngineInner, host: HostId, duration: SimTime, issuer: ActorId) -> ActivityId {
    let mut header = ActivityHeader::new();
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    let body = SleepBody {
        header,
        host,
        duration,
        action: None,
    };
    let id = engine.activities.insert(ActivityRecord::Sleep(body));
    engine.own_activity(issuer, id);
    id
}

/// `start()` (spec §4.F): request a sleep action on the issuer's host.
pub fn start(engine: &mut EngineInner, id: ActivityId, _issuer: ActorId) {
    let duration = match engine.activities.get(id) {
        Some(ActivityRecord::Sleep(b)) => b.duration,
        _ => return,
    };

    let mut action = engine.resource_model.sleep_action(duration, engine.now);
    action.set_activity(id);
    if let Some(ActivityRecord::Sleep(body)) = engine.activities.get_mut(id) {
        body.header.state = ActivityState::Started;
        body.action = Some(action);
    }
}

/// `finish()` (spec §4.F): SRC_HOST_FAILURE if the host went down, CANCELED
/// if the action failed, DONE otherwise.
///
/// Spec §4.F: "suspended actors that wake up from a sleep are re-suspended."
/// No special-case code is needed for this here: the scheduler's runnable
/// queue (spec §4.G step 1) skips suspended actors when it pops the next one
/// to resume, so an actor that was suspended out-of-band while sleeping
/// simply never gets resumed by this wakeup — it stays queued until an
/// explicit `resume()`.
pub fn finish_sleep(engine: &mut EngineInner, id: ActivityId) {
    let (host, action_state) = match engine.activities.get(id) {
        Some(ActivityRecord::Sleep(b)) => (b.host, b.action.as_ref().map(|a| a.state())),
        _ => return,
    };

    let final_state = if !engine.host_is_up(host) {
        ActivityState::SrcHostFailure
    } else {
        match action_state {
            Some(ActionState::Failed) | Some(ActionState::Ignored) => ActivityState::Canceled,
            _ => ActivityState::Done,
        }
    };

    if let Some(ActivityRecord::Sleep(body)) = engine.activities.get_mut(id) {
        body.header.state = final_state;
        if let Some(mut action) = body.action.take() {
            action.cancel();
        }
    }
    activity::finish(engine, id);
}
