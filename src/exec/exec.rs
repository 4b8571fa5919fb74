//! CPU execution activity, single-host and parallel (spec §4.F "Exec").

use crate::activity::{self, ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::resource::{Action, ActionState, LinearAction, ResourceModel};
use crate::util::{ActivityId, ActorId, HostId};

/// Concrete `Exec` activity body. `parallel_flops`/`parallel_hosts` are
/// `Some` only for the parallel form (spec §4.F); `migrate()` refuses that
/// form (single-host only).
pub struct ExecBody {
    pub header: ActivityHeader,
    pub host: HostId,
    pub flops: f64,
    pub core_count: Option<u32>,
    pub bound: Option<f64>,
    pub parallel_hosts: Option<Vec<HostId>>,
    pub parallel_flops: Option<Vec<f64>>,
    pub action: Option<LinearAction>,
}

const DEFAULT_HOST_SPEED: f64 = 1e9; // 1 Gflops/s, used when `bound` is unset.

/// Construct an INITED single-host exec activity bound to `issuer` (spec
/// §6.2 "Construction (no side effects)"). Call [`start`] to begin consuming
/// a compute action.
pub fn new_exec(
    engine: &mut EngineInner,
    host: HostId,
    flops: f64,
    core_count: Option<u32>,
    bound: Option<f64>,
    issuer: ActorId,
) -> ActivityId {
    let mut header = ActivityHeader::new();
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    let body = ExecBody {
        header,
        host,
        flops,
        core_count,
        bound,
        parallel_hosts: None,
        parallel_flops: None,
        action: None,
    };
    let id = engine.activities.insert(ActivityRecord::Exec(body));
    engine.own_activity(issuer, id);
    id
}

/// Construct an INITED parallel exec activity (spec §4.F "parallel form":
/// a vector of flops amounts across a host set). `migrate()` refuses this
/// form.
pub fn new_parallel_exec(
    engine: &mut EngineInner,
    hosts: Vec<HostId>,
    flops: Vec<f64>,
    issuer: ActorId,
) -> ActivityId {
    let primary_host = hosts[0];
    let mut header = ActivityHeader::new();
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    let body = ExecBody {
        header,
        host: primary_host,
        flops: 0.0,
        core_count: None,
        bound: None,
        parallel_hosts: Some(hosts),
        parallel_flops: Some(flops),
        action: None,
    };
    let id = engine.activities.insert(ActivityRecord::Exec(body));
    engine.own_activity(issuer, id);
    id
}

/// `start()` (spec §4.F): request a compute action from the host model.
pub fn start(engine: &mut EngineInner, id: ActivityId, _issuer: ActorId) {
    let (flops, rate) = match engine.activities.get(id) {
        Some(ActivityRecord::Exec(b)) => (total_flops(b), b.bound.unwrap_or(DEFAULT_HOST_SPEED)),
        _ => return,
    };

    let mut action = engine.resource_model.compute_action(flops, rate, engine.now);
    action.set_activity(id);
    if let Some(ActivityRecord::Exec(body)) = engine.activities.get_mut(id) {
        body.header.state = ActivityState::Started;
        body.action = Some(action);
    }
}

fn total_flops(body: &ExecBody) -> f64 {
    match &body.parallel_flops {
        Some(amounts) => amounts.iter().sum(),
        None => body.flops,
    }
}

/// `migrate(to)` (spec §4.F): only while RUNNING, single-host only.
pub fn migrate(engine: &mut EngineInner, id: ActivityId, to: HostId) -> Result<(), crate::error::KernelError> {
    let (running, is_parallel, remains, rate) = match engine.activities.get(id) {
        Some(ActivityRecord::Exec(b)) => (
            b.header.state == ActivityState::Started,
            b.parallel_hosts.is_some(),
            b.action.as_ref().map(|a| a.remains()).unwrap_or(0.0),
            b.bound.unwrap_or(DEFAULT_HOST_SPEED),
        ),
        _ => return Err(crate::error::KernelError::Assertion("migrate on unknown exec activity".into())),
    };
    if is_parallel {
        return Err(crate::error::KernelError::Assertion("migrate() is single-host only".into()));
    }
    if !running {
        return Err(crate::error::KernelError::Assertion("migrate() requires a RUNNING activity".into()));
    }

    let mut new_action = engine.resource_model.compute_action(remains, rate, engine.now);
    new_action.set_activity(id);
    if let Some(ActivityRecord::Exec(body)) = engine.activities.get_mut(id) {
        if let Some(mut old) = body.action.take() {
            old.cancel();
        }
        body.host = to;
        body.action = Some(new_action);
    }
    Ok(())
}

/// `finish()` (spec §4.F): FAILED if the host is down, CANCELED if the
/// action failed but hosts are up, DONE otherwise.
pub fn finish_exec(engine: &mut EngineInner, id: ActivityId) {
    let (host, action_state) = match engine.activities.get(id) {
        Some(ActivityRecord::Exec(b)) => (b.host, b.action.as_ref().map(|a| a.state())),
        _ => return,
    };

    // Spec §4.F labels this terminal state "FAILED", but it is delivered to
    // waiters as a host failure, not a storage failure, so it reuses the
    // directional `SrcHostFailure` variant (a single-host exec has only a
    // "source" side) rather than the generic `Failed` state.
    let final_state = if !engine.host_is_up(host) {
        ActivityState::SrcHostFailure
    } else {
        match action_state {
            Some(ActionState::Failed) | Some(ActionState::Ignored) => ActivityState::Canceled,
            _ => ActivityState::Done,
        }
    };

    if let Some(ActivityRecord::Exec(body)) = engine.activities.get_mut(id) {
        body.header.state = final_state;
        if let Some(mut action) = body.action.take() {
            action.cancel();
        }
    }
    activity::finish(engine, id);
}
