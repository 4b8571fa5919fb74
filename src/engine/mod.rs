//! The kernel object and the maestro scheduler loop (spec §4.G, §9 "Global
//! state").
//!
//! [`EngineInner`] is the single process-wide value every kernel operation
//! takes an explicit `&mut` reference to — there is no `EngineImpl`
//! singleton, just one value passed around. [`Engine`] wraps it in
//! `Rc<RefCell<_>>` so actor bodies (themselves owning a clone of the same
//! handle, via [`crate::actor::ActorContext`]) and the scheduler loop can
//! share it without any locking: exactly one of them ever runs at a time
//! (spec §5 "single logical thread of execution").

pub mod signal;

pub use signal::{EngineObserver, EngineSignal, InMemoryObserver, NoopObserver};

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::activity::ActivityRecord;
use crate::actor::{ActorContext, ActorRecord, ActorRunState, RestartPolicy};
use crate::comm::{Mailbox, MessageQueue};
use crate::config::EngineConfig;
use crate::context::{self, ActorBody};
use crate::error::KernelError;
use crate::resource::{LinearModel, ResourceModel};
use crate::simcall::{BufferChannel, Simcall, SimcallKind, VisibleKind};
use crate::sync::{Barrier, Condvar, Mutex, Semaphore};
use crate::time::{SimTime, TimerHeap};
use crate::util::arena::Arena;
use crate::util::ids::{
    ActivityMarker, ActorMarker, BarrierMarker, CondvarMarker, HostMarker, MailboxMarker,
    MessageQueueMarker, MutexMarker, SemaphoreMarker,
};
use crate::util::{
    ActivityId, ActorId, BarrierId, CondvarId, HostId, MailboxId, MessageQueueId, MutexId,
    SemaphoreId, TimerId,
};

/// A simulated host (spec §3 implies hosts only as an opaque binding target;
/// liveness itself is platform-model territory the kernel only consumes
/// through `host_is_up`/`set_host_up`).
pub struct HostRecord {
    pub name: String,
    pub up: bool,
}

/// Data a timer callback hands off to [`EngineInner::fire_due_timers`]
/// instead of calling back into the engine directly.
///
/// `TimerHeap::set` callbacks are `FnOnce(TimerId) + 'static` with no access
/// to `&mut EngineInner` — capturing a handle back to the engine they were
/// scheduled from would mean re-entering a `RefCell` already borrowed
/// mutably by whichever `advance_time_once` call is running `fire_due`.
/// Instead, timer closures push one of these onto a side channel
/// (`EngineInner::timer_sink`); the engine drains it once `fire_due` returns,
/// while still holding its own `&mut self`.
enum TimerFiring {
    ActivityTimeout { activity: ActivityId, issuer: ActorId },
    WaitAnyTimeout { activities: Vec<ActivityId>, issuer: ActorId },
}

/// The kernel value (spec §9 "Global state... every internal function takes
/// an explicit `&mut Engine`"). Every kernel object lives in one arena per
/// kind (spec §9 "Heap-allocated cyclic graphs"), indexed by a typed,
/// generation-stamped id.
pub struct EngineInner {
    config: EngineConfig,

    /// The simulated clock (spec §5: monotonic non-decreasing).
    pub now: SimTime,

    pub actors: Arena<ActorRecord, ActorMarker>,
    pub activities: Arena<ActivityRecord, ActivityMarker>,
    pub mailboxes: Arena<Mailbox, MailboxMarker>,
    pub message_queues: Arena<MessageQueue, MessageQueueMarker>,
    pub mutexes: Arena<Mutex, MutexMarker>,
    pub semaphores: Arena<Semaphore, SemaphoreMarker>,
    pub barriers: Arena<Barrier, BarrierMarker>,
    pub condvars: Arena<Condvar, CondvarMarker>,
    pub hosts: Arena<HostRecord, HostMarker>,
    pub timers: TimerHeap,

    /// The external resource model (spec §6.1). Concrete rather than generic:
    /// every simcall closure stored on an `ActorRecord` is
    /// `Box<dyn FnOnce(&mut EngineInner)>`, so `EngineInner` itself cannot be
    /// generic over the model without infecting that closure type too. The
    /// reference `LinearModel` is the only implementation this crate ships
    /// (spec §1 excludes the real platform physics); a production build
    /// swaps this field's type, not its shape.
    pub resource_model: LinearModel,

    runnable: VecDeque<ActorId>,
    /// issuer → full activity set of an in-flight `wait_any_for` (spec §4.C):
    /// consulted by [`EngineInner::clear_wait_any_peer`] to unregister the
    /// issuer from every activity but the one that completed.
    wait_any_registry: HashMap<ActorId, Vec<ActivityId>>,
    next_comm_id_counter: u64,
    rng: SmallRng,
    timer_sink: Rc<RefCell<Vec<TimerFiring>>>,
    observers: Vec<Box<dyn EngineObserver>>,
}

impl EngineInner {
    pub fn new(config: EngineConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            config,
            now: 0.0,
            actors: Arena::new(),
            activities: Arena::new(),
            mailboxes: Arena::new(),
            message_queues: Arena::new(),
            mutexes: Arena::new(),
            semaphores: Arena::new(),
            barriers: Arena::new(),
            condvars: Arena::new(),
            hosts: Arena::new(),
            timers: TimerHeap::new(),
            resource_model: LinearModel::new(),
            runnable: VecDeque::new(),
            wait_any_registry: HashMap::new(),
            next_comm_id_counter: 0,
            rng,
            timer_sink: Rc::new(RefCell::new(Vec::new())),
            observers: Vec::new(),
        }
    }

    /// Spawn a minimal actor with no body, on a throwaway host. Only useful
    /// as an `issuer`/`owner` stand-in in unit tests that exercise a single
    /// kernel object in isolation, without driving a real scheduler loop.
    pub fn spawn_bare_actor(&mut self) -> ActorId {
        let host = self.hosts.insert(HostRecord { name: "bare-host".into(), up: true });
        self.actors.insert(ActorRecord::new("bare".into(), host))
    }

    /// `spawn(code)` (spec §4.G): allocate an id, bind its body future, place
    /// it in the runnable queue.
    pub fn spawn_actor<F, Fut>(
        &mut self,
        name: String,
        host: HostId,
        engine_handle: Rc<RefCell<EngineInner>>,
        body: F,
    ) -> ActorId
    where
        F: FnOnce(ActorContext) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let id = self.actors.insert(ActorRecord::new(name.clone(), host));
        let ctx = ActorContext::new(id, engine_handle);
        let body: ActorBody = Box::pin(body(ctx));
        if let Some(actor) = self.actors.get_mut(id) {
            actor.body = Some(body);
        }
        self.enqueue_runnable(id);
        self.emit(EngineSignal::ActorSpawned { actor: id, name });
        id
    }

    /// Whether `host` is currently up. Unknown hosts are treated as up: only
    /// a host the kernel itself registered can ever be brought down.
    pub fn host_is_up(&self, host: HostId) -> bool {
        self.hosts.get(host).map(|h| h.up).unwrap_or(true)
    }

    pub fn new_host(&mut self, name: impl Into<String>) -> HostId {
        self.hosts.insert(HostRecord { name: name.into(), up: true })
    }

    /// Flip a host's liveness (spec §4.G "Restart policy", §8 scenario S5).
    /// Going down fails every in-flight activity bound to the host; coming
    /// back up runs the auto-restart path.
    pub fn set_host_up(&mut self, host: HostId, up: bool) {
        let changed = match self.hosts.get_mut(host) {
            Some(record) if record.up != up => {
                record.up = up;
                true
            }
            _ => false,
        };
        if !changed {
            return;
        }
        self.emit(EngineSignal::HostStateChanged { host, up });
        if up {
            self.restart_actors_on_host(host);
        } else {
            self.fail_activities_on_host(host);
        }
    }

    fn fail_activities_on_host(&mut self, host: HostId) {
        let ids: Vec<ActivityId> = self
            .activities
            .iter()
            .filter(|(_, a)| !a.header().state.is_terminal() && activity_bound_to_host(a, host))
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            match self.activities.get(id) {
                Some(ActivityRecord::Exec(_)) => crate::exec::finish_exec(self, id),
                Some(ActivityRecord::Sleep(_)) => crate::exec::finish_sleep(self, id),
                Some(ActivityRecord::Io(_)) => crate::exec::finish_io(self, id),
                Some(ActivityRecord::Comm(_)) => crate::comm::finish_comm(self, id),
                _ => {}
            }
        }
    }

    /// Auto-restart (spec §4.G): actors bound to `host` with
    /// `RestartPolicy::Always` that have already terminated get a bumped
    /// `restart_count` and an `ActorRestarted` signal. The spawn closure that
    /// produced the original actor body is `FnOnce` and was consumed on
    /// first run, so this does not actually re-spawn fresh code — see
    /// DESIGN.md.
    fn restart_actors_on_host(&mut self, host: HostId) {
        let candidates: Vec<(ActorId, String, u32)> = self
            .actors
            .iter()
            .filter(|(_, a)| a.host == host && a.run_state == ActorRunState::Terminated && a.restart_policy == Some(RestartPolicy::Always))
            .map(|(id, a)| (id, a.name.clone(), a.restart_count))
            .collect();
        for (id, original_name, restart_count) in candidates {
            let restart_count = restart_count + 1;
            if let Some(actor) = self.actors.get_mut(id) {
                actor.restart_count = restart_count;
            }
            self.emit(EngineSignal::ActorRestarted { actor: id, original_name, restart_count });
        }
    }

    pub fn next_comm_id(&mut self) -> u64 {
        let id = self.next_comm_id_counter;
        self.next_comm_id_counter += 1;
        id
    }

    /// `random(a, b)` (spec §4.H): inclusive on both ends.
    pub fn roll_random(&mut self, low: i64, high: i64) -> i64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    pub fn model_checker_active(&self) -> bool {
        self.config.model_checker_active
    }

    pub fn own_activity(&mut self, issuer: ActorId, id: ActivityId) {
        if let Some(actor) = self.actors.get_mut(issuer) {
            actor.owned_activities.push(id);
        }
    }

    pub fn remove_owned_activity(&mut self, issuer: ActorId, id: ActivityId) {
        if let Some(actor) = self.actors.get_mut(issuer) {
            actor.owned_activities.retain(|&owned| owned != id);
        }
    }

    /// Record that `issuer` is now parked on `activities` (spec §3 "multiset
    /// of activities it is currently waiting on").
    pub fn remember_waiting_on(&mut self, issuer: ActorId, activity: ActivityId) {
        if let Some(actor) = self.actors.get_mut(issuer) {
            actor.waiting_on.push(activity);
        }
    }

    /// The mirror of [`EngineInner::remember_waiting_on`], called once a
    /// wait on `activity` resolves (by completion or by timeout).
    pub fn forget_waiting_on(&mut self, issuer: ActorId, activity: ActivityId) {
        if let Some(actor) = self.actors.get_mut(issuer) {
            actor.waiting_on.retain(|&id| id != activity);
        }
    }

    pub fn register_wait_any(&mut self, issuer: ActorId, activities: Vec<ActivityId>) {
        self.wait_any_registry.insert(issuer, activities);
    }

    /// Called from every activity's `finish()` tail for every one of its
    /// waiters (spec §4.C "First activity to complete unregisters the
    /// simcall from all others"). A no-op for a plain `wait_for` waiter —
    /// only waiters that went through `wait_any_for` have an entry here.
    pub fn clear_wait_any_peer(&mut self, issuer: ActorId, completed: ActivityId) {
        let Some(peers) = self.wait_any_registry.remove(&issuer) else {
            return;
        };
        if let Some(index) = peers.iter().position(|&id| id == completed) {
            if let Some(actor) = self.actors.get_mut(issuer) {
                actor.wait_any_result = Some(index as i64);
            }
        }
        for &peer in &peers {
            if peer == completed {
                continue;
            }
            self.forget_waiting_on(issuer, peer);
            if let Some(activity) = self.activities.get_mut(peer) {
                let header = activity.header_mut();
                if let Some(pos) = header.waiters.iter().position(|w| w.issuer == issuer) {
                    let waiter = header.waiters.remove(pos);
                    if let Some(timer) = waiter.timeout_timer {
                        self.timers.cancel(timer);
                    }
                }
            }
        }
    }

    /// Wake `issuer`, optionally handing it an exception to surface through
    /// its pending simcall (spec §4.C `finish()` step (d)). If the actor is
    /// suspended, its `run_state` still moves to `Runnable` but it is not
    /// pushed onto the physical runnable queue — it stays parked until an
    /// explicit [`EngineInner::resume_actor`] (spec §4.F sleep/finish note:
    /// "it stays queued until an explicit `resume()`").
    fn deliver_and_wake(&mut self, issuer: ActorId, exception: Option<KernelError>) {
        let Some(actor) = self.actors.get_mut(issuer) else {
            return;
        };
        if actor.run_state == ActorRunState::Terminated {
            return;
        }
        if let Some(err) = exception {
            actor.exception = Some(err);
        }
        actor.run_state = ActorRunState::Runnable;
        let suspended = actor.suspended;
        if !suspended {
            self.enqueue_runnable(issuer);
        }
    }

    /// Unconditionally place `id` onto the runnable queue, bypassing the
    /// suspension gate in [`EngineInner::deliver_and_wake`] — used by
    /// `spawn`, `kill` (which must force a suspended actor to observe its own
    /// death), an explicit `resume()`, and the `RUN_ANSWERED` requeue.
    fn enqueue_runnable(&mut self, id: ActorId) {
        let Some(actor) = self.actors.get_mut(id) else {
            return;
        };
        if actor.run_state == ActorRunState::Terminated {
            return;
        }
        actor.run_state = ActorRunState::Runnable;
        if !actor.queued_for_run {
            actor.queued_for_run = true;
            self.runnable.push_back(id);
        }
    }

    /// `resume()` (spec §6.2): clears the suspension and force-enqueues,
    /// regardless of whatever `deliver_and_wake` decided earlier.
    pub fn resume_actor(&mut self, target: ActorId) {
        if let Some(actor) = self.actors.get_mut(target) {
            actor.suspended = false;
        }
        self.enqueue_runnable(target);
    }

    /// `join(actor)` (spec §4.G, §6.2): wake `issuer` once `target`
    /// terminates, immediately if it already has.
    pub fn join_actor(&mut self, target: ActorId, issuer: ActorId) {
        let terminated = self.actors.get(target).map(|a| a.run_state == ActorRunState::Terminated).unwrap_or(true);
        if terminated {
            self.deliver_and_wake(issuer, None);
        } else if let Some(actor) = self.actors.get_mut(target) {
            actor.on_exit.push(Box::new(move |engine| engine.deliver_and_wake(issuer, None)));
        }
    }

    /// `kill(actor)` (spec §4.G): sets `wants_to_die`; the next time `target`
    /// is resumed, its pending `Suspend` resolves to `Err(ForcefulKill)`,
    /// unwinding its body and running `terminate_actor` once that body
    /// future completes.
    pub fn kill_actor(&mut self, target: ActorId) {
        let already_terminated = self.actors.get(target).map(|a| a.run_state == ActorRunState::Terminated).unwrap_or(true);
        if already_terminated {
            return;
        }
        if let Some(actor) = self.actors.get_mut(target) {
            actor.wants_to_die = true;
        }
        self.enqueue_runnable(target);
        self.emit(EngineSignal::ActorKilled { actor: target });
    }

    /// Run once an actor's body future resolves (spec §4.G "destroyed after
    /// its function returns OR it is killed"): cancel every activity it
    /// still owns, fail any detached send hinted at it (spec §8 S5), then run
    /// its on-exit callbacks in registration order.
    fn terminate_actor(&mut self, id: ActorId) {
        let already = self.actors.get(id).map(|a| a.run_state == ActorRunState::Terminated).unwrap_or(true);
        if already {
            return;
        }

        self.unregister_from_waiting(id);

        let owned: Vec<ActivityId> = self.actors.get(id).map(|a| a.owned_activities.clone()).unwrap_or_default();
        for activity_id in owned {
            crate::activity::cancel(self, activity_id);
        }

        if let Some(actor) = self.actors.get_mut(id) {
            actor.run_state = ActorRunState::Terminated;
            actor.body = None;
            actor.queued_for_run = false;
        }

        crate::comm::fail_sends_hinted_at(self, id);

        let callbacks = self.actors.get_mut(id).map(|a| std::mem::take(&mut a.on_exit)).unwrap_or_default();
        for callback in callbacks {
            callback(self);
        }

        self.emit(EngineSignal::ActorTerminated { actor: id });
    }

    /// Remove `issuer` from the waiters list of every activity it is parked
    /// on, canceling any per-waiter timeout timer (spec §8 invariant 8: "An
    /// actor killed while waiting on N activities is removed from the
    /// waiters lists of all N before its on-exit callbacks run").
    fn unregister_from_waiting(&mut self, issuer: ActorId) {
        let waiting: Vec<ActivityId> = self.actors.get(issuer).map(|a| a.waiting_on.clone()).unwrap_or_default();
        for activity_id in waiting {
            if let Some(activity) = self.activities.get_mut(activity_id) {
                let header = activity.header_mut();
                if let Some(pos) = header.waiters.iter().position(|w| w.issuer == issuer) {
                    let waiter = header.waiters.remove(pos);
                    if let Some(timer) = waiter.timeout_timer {
                        self.timers.cancel(timer);
                    }
                }
            }
        }
        if let Some(actor) = self.actors.get_mut(issuer) {
            actor.waiting_on.clear();
        }
        self.wait_any_registry.remove(&issuer);
    }

    /// Arm a single-activity timeout (spec §4.C `wait_for`): fires a
    /// `TimerFiring::ActivityTimeout` into [`EngineInner::timer_sink`].
    pub fn schedule_timeout(&mut self, fire_at: SimTime, activity: ActivityId, issuer: ActorId) -> TimerId {
        let sink = self.timer_sink.clone();
        self.timers.set(fire_at, move |_timer_id| {
            sink.borrow_mut().push(TimerFiring::ActivityTimeout { activity, issuer });
        })
    }

    /// Arm a shared `wait_any_for` timeout (spec §4.C).
    pub fn schedule_wait_any_timeout(&mut self, fire_at: SimTime, activities: Vec<ActivityId>, issuer: ActorId) -> TimerId {
        let sink = self.timer_sink.clone();
        self.timers.set(fire_at, move |_timer_id| {
            sink.borrow_mut().push(TimerFiring::WaitAnyTimeout { activities, issuer });
        })
    }

    fn fire_activity_timeout(&mut self, activity: ActivityId, issuer: ActorId) {
        if let Some(act) = self.activities.get_mut(activity) {
            act.header_mut().waiters.retain(|w| w.issuer != issuer);
        }
        self.forget_waiting_on(issuer, activity);
        self.clear_wait_any_peer(issuer, activity);
        self.deliver_and_wake(issuer, Some(KernelError::Timeout(activity)));
    }

    fn fire_wait_any_timeout(&mut self, activities: Vec<ActivityId>, issuer: ActorId) {
        for &id in &activities {
            if let Some(act) = self.activities.get_mut(id) {
                act.header_mut().waiters.retain(|w| w.issuer != issuer);
            }
            self.forget_waiting_on(issuer, id);
        }
        self.wait_any_registry.remove(&issuer);
        if let Some(actor) = self.actors.get_mut(issuer) {
            actor.wait_any_result = Some(-1);
        }
        let representative = activities.first().copied();
        self.deliver_and_wake(issuer, representative.map(KernelError::Timeout));
    }

    /// Pop and run every timer due at `self.now`, then drain the firings
    /// each callback pushed onto [`EngineInner::timer_sink`] (see
    /// [`TimerFiring`] for why this two-step dance exists instead of a
    /// direct callback into the engine).
    fn fire_due_timers(&mut self) {
        self.timers.fire_due(self.now);
        let firings: Vec<TimerFiring> = self.timer_sink.borrow_mut().drain(..).collect();
        for firing in firings {
            match firing {
                TimerFiring::ActivityTimeout { activity, issuer } => self.fire_activity_timeout(activity, issuer),
                TimerFiring::WaitAnyTimeout { activities, issuer } => self.fire_wait_any_timeout(activities, issuer),
            }
        }
    }

    fn finish_completed_actions(&mut self, completed: Vec<ActivityId>) {
        for id in completed {
            match self.activities.get(id) {
                Some(ActivityRecord::Comm(_)) => crate::comm::finish_comm(self, id),
                Some(ActivityRecord::Exec(_)) => crate::exec::finish_exec(self, id),
                Some(ActivityRecord::Io(_)) => crate::exec::finish_io(self, id),
                Some(ActivityRecord::Sleep(_)) => crate::exec::finish_sleep(self, id),
                _ => {}
            }
        }
    }

    /// One pass of scheduler loop step 3 (spec §4.G): advance `now` to the
    /// earlier of the next resource event and the next timer, update the
    /// resource model, fire due timers, and run `finish()` on every action
    /// that completed. Returns `false` when there is nothing left to wait
    /// for (simulation end).
    pub fn advance_time_once(&mut self) -> bool {
        let t_res = self.resource_model.next_occurring_event(self.now);
        let t_timer = self.timers.peek_next_date();
        let next = match (t_res, t_timer) {
            (None, None) => return false,
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (Some(a), Some(b)) => a.min(b),
        };
        let delta = (next - self.now).max(0.0);
        self.now = next;

        let completed = self.resource_model.update_actions_state(self.now, delta);
        self.fire_due_timers();
        self.finish_completed_actions(completed);
        true
    }

    /// Pop the next runnable actor, skipping any that terminated while still
    /// enqueued.
    fn pop_runnable(&mut self) -> Option<ActorId> {
        while let Some(id) = self.runnable.pop_front() {
            match self.actors.get_mut(id) {
                Some(actor) if actor.run_state != ActorRunState::Terminated => {
                    actor.queued_for_run = false;
                    return Some(id);
                }
                _ => continue,
            }
        }
        None
    }

    /// True iff every non-terminated actor is a daemon (spec §6.2
    /// `daemonize()`, per-actor doc: "a daemon actor does not keep the
    /// simulation alive on its own once every non-daemon actor has exited").
    fn only_daemons_remain(&self) -> bool {
        let mut any_daemon = false;
        for (_, actor) in self.actors.iter() {
            if actor.run_state == ActorRunState::Terminated {
                continue;
            }
            if actor.daemon {
                any_daemon = true;
            } else {
                return false;
            }
        }
        any_daemon
    }

    /// Force-kill every live daemon. Run only once [`only_daemons_remain`]
    /// confirms there is nothing left for them to wait on but each other,
    /// so this terminates rather than looping forever.
    ///
    /// [`only_daemons_remain`]: EngineInner::only_daemons_remain
    fn kill_all_daemons(&mut self) {
        let ids: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, a)| a.daemon && a.run_state != ActorRunState::Terminated)
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.kill_actor(id);
        }
    }

    fn emit(&mut self, signal: EngineSignal) {
        tracing::trace!(at = %chrono::Utc::now(), ?signal, "engine signal");
        for observer in &mut self.observers {
            observer.on_signal(&signal);
        }
    }
}

fn activity_bound_to_host(activity: &ActivityRecord, host: HostId) -> bool {
    match activity {
        ActivityRecord::Exec(b) => b.host == host,
        ActivityRecord::Sleep(b) => b.host == host,
        ActivityRecord::Io(b) => b.host == host,
        ActivityRecord::Comm(b) => b.src_host == Some(host) || b.dst_host == Some(host),
        ActivityRecord::Mess(_)
        | ActivityRecord::MutexAcq(_)
        | ActivityRecord::SemAcq(_)
        | ActivityRecord::BarrierAcq(_)
        | ActivityRecord::CondvarAcq(_) => false,
    }
}

/// The user-facing handle to a simulation (spec §9 "every internal function
/// takes an explicit `&mut Engine` or lives as a method of it"). Cheap to
/// clone — every clone shares the same `EngineInner`. Deliberately
/// `!Send`/`!Sync` by construction (spec §5): it holds `Rc<RefCell<_>>`
/// throughout, so the type system rules out accidental cross-thread sharing
/// rather than a runtime check.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<RefCell<EngineInner>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { inner: Rc::new(RefCell::new(EngineInner::new(config))) }
    }

    /// An engine with default configuration, for tests that only need to
    /// exercise one kernel object in isolation via [`Engine::with_inner_mut`].
    pub fn new_for_tests() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Run `f` against the shared `EngineInner`. The escape hatch every unit
    /// test in this crate uses to set up arena state before calling a free
    /// function like `lock_async`/`isend` directly.
    pub fn with_inner_mut<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut EngineInner) -> T,
    {
        f(&mut self.inner.borrow_mut())
    }

    /// Attach a signal subscriber (spec §4.G "Signals"). Fired only from
    /// maestro context, in subscription order.
    pub fn subscribe(&self, observer: Box<dyn EngineObserver>) {
        self.inner.borrow_mut().observers.push(observer);
    }

    pub fn new_host(&self, name: impl Into<String>) -> HostId {
        self.inner.borrow_mut().new_host(name)
    }

    pub fn set_host_up(&self, host: HostId, up: bool) {
        self.inner.borrow_mut().set_host_up(host, up);
    }

    pub fn now(&self) -> SimTime {
        self.inner.borrow().now
    }

    /// `spawn(code)` (spec §4.G) issued from outside any running actor (the
    /// entry point setting up the initial actor population). From inside a
    /// running actor, use [`ActorContext::spawn`] instead.
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, host: HostId, body: F) -> ActorId
    where
        F: FnOnce(ActorContext) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        inner.spawn_actor(name.into(), host, self.inner.clone(), body)
    }

    /// The maestro loop (spec §4.G steps 1-4): drain the runnable queue,
    /// force-kill any daemons left alone with nothing but each other, and
    /// advance simulated time — repeating until nothing is left to run or
    /// to wait for.
    pub fn run(&self) {
        loop {
            self.drain_runnable_queue();
            if self.inner.borrow().only_daemons_remain() {
                self.inner.borrow_mut().kill_all_daemons();
                self.drain_runnable_queue();
            }
            if !self.advance_time() {
                break;
            }
        }
    }

    fn drain_runnable_queue(&self) {
        loop {
            let next = self.inner.borrow_mut().pop_runnable();
            match next {
                Some(actor) => self.resume_one(actor),
                None => break,
            }
        }
    }

    /// Resume one actor's body to its next `yield()` or completion (spec
    /// §4.A `resume(actor)`), then dispatch whatever simcall it left behind.
    pub fn resume_one(&self, actor: ActorId) {
        let body = self.inner.borrow_mut().actors.get_mut(actor).and_then(|a| a.body.take());
        let Some(mut body) = body else {
            return;
        };

        let finished = context::poll_actor(&mut body);
        if finished {
            self.inner.borrow_mut().terminate_actor(actor);
            return;
        }

        let pending = {
            let mut inner = self.inner.borrow_mut();
            if let Some(record) = inner.actors.get_mut(actor) {
                record.body = Some(body);
                record.pending_simcall.take()
            } else {
                None
            }
        };
        if let Some(simcall) = pending {
            self.dispatch_pending_simcall(simcall);
        }
    }

    /// Simcall dispatch (spec §4.H): run the attached closure, then either
    /// requeue the issuer this same round (`RUN_ANSWERED`) or leave it to the
    /// closure/a later `finish()` to wake it (`RUN_BLOCKING`).
    ///
    /// A visible simcall carries an observer. When a model checker is
    /// attached, `is_enabled`/`prepare` run before the closure so a forced
    /// outcome is in place before any state changes; `set_result`/`serialize`
    /// run after, and the serialized bytes go out as a signal any subscriber
    /// can read off its own channel (spec §6.3). The one outcome this
    /// generic dispatch point can recover on its own is `wait_any`'s ready
    /// index, already sitting on the actor record by the time the closure
    /// returns; every other visible kind reports `0`, since the closure
    /// itself is type-erased to `FnOnce(&mut EngineInner)` by the time it
    /// reaches here and carries no result channel back out.
    fn dispatch_pending_simcall(&self, simcall: Simcall) {
        let Simcall { kind, issuer, mut observer, closure } = simcall;

        let model_checker_active = self.inner.borrow().model_checker_active();
        if let Some(obs) = observer.as_deref_mut() {
            if model_checker_active {
                if !obs.is_enabled() {
                    tracing::trace!(actor = issuer.serial(), kind = ?obs.kind(), "simcall observer reports not enabled");
                }
                obs.prepare(0);
            }
        }

        if let Some(closure) = closure {
            closure(&mut self.inner.borrow_mut());
        }

        if let Some(mut obs) = observer {
            let outcome = if obs.kind() == VisibleKind::WaitAny {
                self.inner
                    .borrow_mut()
                    .actors
                    .get_mut(issuer)
                    .and_then(|a| a.wait_any_result)
                    .unwrap_or(-1)
            } else {
                0
            };
            obs.set_result(outcome);
            let mut channel = BufferChannel::default();
            obs.serialize(&mut channel);
            self.inner.borrow_mut().emit(EngineSignal::SimcallObserved {
                actor: issuer,
                kind: obs.kind(),
                bytes: channel.bytes,
            });
        }

        if kind == SimcallKind::RunAnswered {
            self.inner.borrow_mut().enqueue_runnable(issuer);
        }
    }

    /// One scheduler-loop step 3 pass (spec §4.G). Returns `false` once
    /// neither the resource model nor the timer heap has anything pending.
    pub fn advance_time(&self) -> bool {
        self.inner.borrow_mut().advance_time_once()
    }
}
