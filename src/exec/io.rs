//! Disk I/O activity (spec §4.F "I/O"): analogous to [`crate::exec::exec`],
//! bound to a disk and a byte amount instead of a host and a flops amount.

use crate::activity::{self, ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::resource::{Action, ActionState, LinearAction, ResourceModel};
use crate::util::{ActivityId, ActorId, HostId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOpKind {
    Read,
    Write,
    ReadWrite,
}

const DEFAULT_DISK_RATE: f64 = 5e8; // 500 MB/s, used when `bound` is unset.

/// Concrete `I/O` activity body, bound to the host that owns the disk.
pub struct IoBody {
    pub header: ActivityHeader,
    pub host: HostId,
    pub bytes: f64,
    pub op: IoOpKind,
    pub bound: Option<f64>,
    pub action: Option<LinearAction>,
}

/// Construct an INITED I/O activity bound to `issuer` (spec §6.2
/// "Construction (no side effects)"). Call [`start`] to begin consuming a
/// disk action.
pub fn new_io(
    engine: &mut EngineInner,
    host: HostId,
    bytes: f64,
    op: IoOpKind,
    bound: Option<f64>,
    issuer: ActorId,
) -> ActivityId {
    let mut header = ActivityHeader::new();
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    let body = IoBody {
        header,
        host,
        bytes,
        op,
        bound,
        action: None,
    };
    let id = engine.activities.insert(ActivityRecord::Io(body));
    engine.own_activity(issuer, id);
    id
}

/// `start()` (spec §4.F): request a disk action from the host model.
pub fn start(engine: &mut EngineInner, id: ActivityId, _issuer: ActorId) {
    let (bytes, rate) = match engine.activities.get(id) {
        Some(ActivityRecord::Io(b)) => (b.bytes, b.bound.unwrap_or(DEFAULT_DISK_RATE)),
        _ => return,
    };

    let mut action = engine.resource_model.disk_action(bytes, rate, engine.now);
    action.set_activity(id);
    if let Some(ActivityRecord::Io(body)) = engine.activities.get_mut(id) {
        body.header.state = ActivityState::Started;
        body.action = Some(action);
    }
}

/// `finish()` (spec §4.F): FAILED if the host is down, CANCELED if the
/// action failed but the host is up, DONE otherwise.
pub fn finish_io(engine: &mut EngineInner, id: ActivityId) {
    let (host, action_state) = match engine.activities.get(id) {
        Some(ActivityRecord::Io(b)) => (b.host, b.action.as_ref().map(|a| a.state())),
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

    if let Some(ActivityRecord::Io(body)) = engine.activities.get_mut(id) {
        body.header.state = final_state;
        if let Some(mut action) = body.action.take() {
            action.cancel();
        }
    }
    activity::finish(engine, id);
}
