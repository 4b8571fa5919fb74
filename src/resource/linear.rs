//! A constant-bandwidth, constant-latency, no-contention resource model.
//!
//! This is a deterministic test double, not an attempt at the LMM/max-min
//! solver the purpose-and-scope section excludes: every action gets its full
//! requested rate as if it were the only thing running on its host or link.
//! It exists solely so the rest of the kernel is testable end-to-end without
//! a real platform simulator.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::resource::{Action, ActionState, ResourceModel};
use crate::time::SimTime;
use crate::util::ActivityId;

const EPSILON: f64 = 1e-12;

struct Job {
    /// Total work requested, in the caller's own units (bytes, flops, ...).
    cost: f64,
    /// Work remaining.
    remains: f64,
    /// Units consumed per simulated second once past `latency_remaining`.
    rate: f64,
    /// Fixed delay (e.g. network latency) before `remains` starts dropping.
    latency_remaining: SimTime,
    start_time: SimTime,
    state: ActionState,
    suspended: bool,
    activity: Option<ActivityId>,
}

struct Inner {
    jobs: HashMap<u64, Job>,
    next_job_id: u64,
}

/// A constant-rate resource model: network transfers, CPU bursts, disk
/// transfers, and sleeps all reduce to "cost units at a fixed rate, after an
/// optional fixed latency."
#[derive(Clone)]
pub struct LinearModel {
    inner: Rc<RefCell<Inner>>,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                jobs: HashMap::new(),
                next_job_id: 0,
            })),
        }
    }

    fn spawn(&self, cost: f64, rate: f64, latency: SimTime, now: SimTime) -> LinearAction {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_job_id;
        inner.next_job_id += 1;
        inner.jobs.insert(
            id,
            Job {
                cost,
                remains: cost,
                rate,
                latency_remaining: latency,
                start_time: now,
                state: ActionState::Started,
                suspended: false,
                activity: None,
            },
        );
        LinearAction {
            inner: self.inner.clone(),
            job_id: id,
        }
    }

    /// A network transfer of `bytes` over a link of `bandwidth` (bytes/sec)
    /// and `latency` (seconds).
    pub fn network_action(&self, bytes: f64, bandwidth: f64, latency: SimTime, now: SimTime) -> LinearAction {
        self.spawn(bytes, bandwidth, latency, now)
    }

    /// A CPU burst of `flops` at `speed` (flops/sec).
    pub fn compute_action(&self, flops: f64, speed: f64, now: SimTime) -> LinearAction {
        self.spawn(flops, speed, 0.0, now)
    }

    /// A disk transfer of `bytes` at `bandwidth` (bytes/sec).
    pub fn disk_action(&self, bytes: f64, bandwidth: f64, now: SimTime) -> LinearAction {
        self.spawn(bytes, bandwidth, 0.0, now)
    }

    /// A sleep of `duration` seconds, modeled as one unit of work at a rate
    /// of one unit per second.
    pub fn sleep_action(&self, duration: SimTime, now: SimTime) -> LinearAction {
        self.spawn(duration, 1.0, 0.0, now)
    }

    /// Force an in-flight action to [`ActionState::Failed`], simulating a
    /// host or link going down underneath it. Returns `false` if the job no
    /// longer exists.
    pub fn fail(&self, action: &LinearAction) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.jobs.get_mut(&action.job_id) {
            Some(job) if !job.state_is_terminal() => {
                job.state = ActionState::Failed;
                true
            }
            _ => false,
        }
    }

    fn time_to_finish(job: &Job) -> SimTime {
        job.latency_remaining + if job.rate > 0.0 { job.remains / job.rate } else { 0.0 }
    }
}

impl Job {
    fn state_is_terminal(&self) -> bool {
        matches!(
            self.state,
            ActionState::Finished | ActionState::Failed | ActionState::Ignored
        )
    }
}

impl ResourceModel for LinearModel {
    type ActionHandle = LinearAction;

    fn network_action(&self, bytes: f64, rate: f64, latency: SimTime, now: SimTime) -> LinearAction {
        self.spawn(bytes, rate, latency, now)
    }

    fn compute_action(&self, flops: f64, rate: f64, now: SimTime) -> LinearAction {
        self.spawn(flops, rate, 0.0, now)
    }

    fn disk_action(&self, bytes: f64, rate: f64, now: SimTime) -> LinearAction {
        self.spawn(bytes, rate, 0.0, now)
    }

    fn sleep_action(&self, duration: SimTime, now: SimTime) -> LinearAction {
        self.spawn(duration, 1.0, 0.0, now)
    }

    fn next_occurring_event(&self, now: SimTime) -> Option<SimTime> {
        let inner = self.inner.borrow();
        inner
            .jobs
            .values()
            .filter(|j| j.state == ActionState::Started && !j.suspended)
            .map(|j| now + LinearModel::time_to_finish(j))
            .fold(None, |acc, t| Some(acc.map_or(t, |a: SimTime| a.min(t))))
    }

    fn update_actions_state(&mut self, _now: SimTime, delta: f64) -> Vec<ActivityId> {
        let mut inner = self.inner.borrow_mut();
        let mut completed = Vec::new();
        for job in inner.jobs.values_mut() {
            if job.state != ActionState::Started || job.suspended {
                continue;
            }
            let mut remaining_delta = delta;
            if job.latency_remaining > 0.0 {
                let consumed = remaining_delta.min(job.latency_remaining);
                job.latency_remaining -= consumed;
                remaining_delta -= consumed;
            }
            if job.rate > 0.0 {
                job.remains -= remaining_delta * job.rate;
            }
            if job.remains <= EPSILON && job.latency_remaining <= EPSILON {
                job.remains = 0.0;
                job.state = ActionState::Finished;
                if let Some(activity) = job.activity {
                    completed.push(activity);
                }
            }
        }
        completed
    }
}

/// Handle to one [`LinearModel`] job.
#[derive(Clone)]
pub struct LinearAction {
    inner: Rc<RefCell<Inner>>,
    job_id: u64,
}

impl Action for LinearAction {
    fn state(&self) -> ActionState {
        self.inner
            .borrow()
            .jobs
            .get(&self.job_id)
            .map(|j| j.state)
            .unwrap_or(ActionState::Ignored)
    }

    fn remains(&self) -> f64 {
        self.inner.borrow().jobs.get(&self.job_id).map(|j| j.remains).unwrap_or(0.0)
    }

    fn start_time(&self) -> SimTime {
        self.inner.borrow().jobs.get(&self.job_id).map(|j| j.start_time).unwrap_or(0.0)
    }

    fn cost(&self) -> f64 {
        self.inner.borrow().jobs.get(&self.job_id).map(|j| j.cost).unwrap_or(0.0)
    }

    fn cancel(&mut self) {
        if let Some(job) = self.inner.borrow_mut().jobs.get_mut(&self.job_id) {
            if !job.state_is_terminal() {
                job.state = ActionState::Ignored;
            }
        }
    }

    fn suspend(&mut self) {
        if let Some(job) = self.inner.borrow_mut().jobs.get_mut(&self.job_id) {
            job.suspended = true;
        }
    }

    fn resume(&mut self) {
        if let Some(job) = self.inner.borrow_mut().jobs.get_mut(&self.job_id) {
            job.suspended = false;
        }
    }

    fn set_activity(&mut self, activity: ActivityId) {
        if let Some(job) = self.inner.borrow_mut().jobs.get_mut(&self.job_id) {
            job.activity = Some(activity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::arena::Arena;

    fn dummy_activity_id() -> ActivityId {
        let mut arena: Arena<(), crate::util::ids::ActivityMarker> = Arena::new();
        arena.insert(())
    }

    #[test]
    fn network_action_accounts_for_latency_and_bandwidth() {
        let model = LinearModel::new();
        let mut action = model.network_action(1_000_000.0, 1e9, 1e-3, 0.0);
        action.set_activity(dummy_activity_id());

        let mut model = model;
        let finish = model.next_occurring_event(0.0).unwrap();
        assert!((finish - 2e-3).abs() < 1e-9);

        let completed = model.update_actions_state(0.0, finish);
        assert_eq!(completed.len(), 1);
        assert_eq!(action.state(), ActionState::Finished);
    }

    #[test]
    fn canceled_action_never_reports_complete() {
        let model = LinearModel::new();
        let mut action = model.network_action(1.0, 1.0, 0.0, 0.0);
        action.set_activity(dummy_activity_id());
        action.cancel();

        let mut model = model;
        let completed = model.update_actions_state(0.0, 10.0);
        assert!(completed.is_empty());
        assert_eq!(action.state(), ActionState::Ignored);
    }

    #[test]
    fn suspended_action_makes_no_progress() {
        let model = LinearModel::new();
        let mut action = model.sleep_action(1.0, 0.0);
        action.set_activity(dummy_activity_id());
        action.suspend();

        let mut model = model;
        model.update_actions_state(0.0, 5.0);
        assert_eq!(action.state(), ActionState::Started);
        assert_eq!(action.remains(), 1.0);

        action.resume();
        model.update_actions_state(0.0, 5.0);
        assert_eq!(action.state(), ActionState::Finished);
    }
}
