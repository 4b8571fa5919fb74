//! The actor object and the handle user code runs inside of (spec §3
//! "Actor", §4.G, §6.2).

pub mod state;

pub use state::{ActorRunState, RestartPolicy};

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::context::{self, ActorBody};
use crate::engine::EngineInner;
use crate::error::KernelError;
use crate::simcall::{BasicObserver, Simcall, SimcallKind, SimcallObserver, VisibleKind};
use crate::time::SimTime;
use crate::util::{ActivityId, ActorId, BarrierId, CondvarId, HostId, MutexId, SemaphoreId};

/// Everything an actor body sees failing as (spec §4.A, §7): either the
/// kernel delivered an ordinary recoverable error onto a wait, or the actor
/// itself was killed and must unwind. Unifying both under one `?`-friendly
/// enum is how `ForcefulKill` "propagates past every `?` an actor body might
/// place in its way" (see [`crate::error::ForcefulKill`]) without requiring
/// a panic or a second, incompatible error channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error("actor was forcefully killed")]
    Killed,
}

/// The actor kernel object (spec §3 "Actor"). Lives in `EngineInner::actors`.
pub struct ActorRecord {
    pub name: String,
    pub host: HostId,
    pub body: Option<ActorBody>,
    pub run_state: ActorRunState,
    pub suspended: bool,
    pub wants_to_die: bool,
    pub exception: Option<KernelError>,
    pub wait_any_result: Option<i64>,
    pub owned_activities: Vec<ActivityId>,
    pub waiting_on: Vec<ActivityId>,
    pub pending_simcall: Option<Simcall>,
    pub on_exit: Vec<Box<dyn FnOnce(&mut EngineInner)>>,
    pub restart_policy: Option<RestartPolicy>,
    pub restart_count: u32,
    pub queued_for_run: bool,
    pub daemon: bool,
}

impl ActorRecord {
    pub fn new(name: String, host: HostId) -> Self {
        Self {
            name,
            host,
            body: None,
            run_state: ActorRunState::Runnable,
            suspended: false,
            wants_to_die: false,
            exception: None,
            wait_any_result: None,
            owned_activities: Vec::new(),
            waiting_on: Vec::new(),
            pending_simcall: None,
            on_exit: Vec::new(),
            restart_policy: None,
            restart_count: 0,
            queued_for_run: false,
            daemon: false,
        }
    }
}

/// The handle an actor body uses to issue simcalls (spec §6.2). Cheap to
/// clone: it is just an id plus a handle to the shared engine.
#[derive(Clone)]
pub struct ActorContext {
    actor: ActorId,
    engine: Rc<RefCell<EngineInner>>,
}

impl ActorContext {
    pub fn new(actor: ActorId, engine: Rc<RefCell<EngineInner>>) -> Self {
        Self { actor, engine }
    }

    /// This context's own actor id.
    pub fn id(&self) -> ActorId {
        self.actor
    }

    fn host(&self) -> HostId {
        self.engine.borrow().actors.get(self.actor).expect("actor context outlived its record").host
    }

    /// Run `effect` against the engine on this same round and resume with
    /// its return value (spec §4.H `RUN_ANSWERED`).
    async fn issue_answered<T: 'static>(
        &self,
        observer: Option<Box<dyn SimcallObserver>>,
        effect: impl FnOnce(&mut EngineInner) -> T + 'static,
    ) -> Result<T, ActorError> {
        let slot: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
        let slot_for_closure = slot.clone();
        let closure: Box<dyn FnOnce(&mut EngineInner)> = Box::new(move |engine| {
            *slot_for_closure.borrow_mut() = Some(effect(engine));
        });
        {
            let mut engine = self.engine.borrow_mut();
            engine.actors.get_mut(self.actor).expect("issue_answered on unknown actor").pending_simcall = Some(Simcall {
                kind: SimcallKind::RunAnswered,
                issuer: self.actor,
                observer,
                closure: Some(closure),
            });
        }
        context::yield_now(self.engine.clone(), self.actor).await.map_err(|_| ActorError::Killed)?;
        Ok(slot.borrow_mut().take().expect("RUN_ANSWERED dispatch always runs its closure before requeueing the issuer"))
    }

    /// Run `effect` against the engine, then park until something (a later
    /// `finish()` or timer callback) makes this actor runnable again (spec
    /// §4.H `RUN_BLOCKING`). Any exception left in the actor's slot by that
    /// wakeup is surfaced as `Err`.
    async fn issue_blocking(
        &self,
        observer: Option<Box<dyn SimcallObserver>>,
        effect: impl FnOnce(&mut EngineInner) + 'static,
    ) -> Result<(), ActorError> {
        {
            let mut engine = self.engine.borrow_mut();
            engine.actors.get_mut(self.actor).expect("issue_blocking on unknown actor").pending_simcall = Some(Simcall {
                kind: SimcallKind::RunBlocking,
                issuer: self.actor,
                observer,
                closure: Some(Box::new(effect)),
            });
        }
        context::yield_now(self.engine.clone(), self.actor).await.map_err(|_| ActorError::Killed)?;
        let exception = self.engine.borrow_mut().actors.get_mut(self.actor).and_then(|a| a.exception.take());
        match exception {
            Some(err) => Err(ActorError::Kernel(err)),
            None => Ok(()),
        }
    }

    /// `wait_for(timeout)` on any activity handle (spec §4.C, §6.2). Carries
    /// no observer of its own: this primitive has no way to know which
    /// `VisibleKind` the activity it parks on corresponds to. Callers that
    /// need a visible wait go through [`ActorContext::wait_for_as`] instead.
    pub async fn wait_for(&self, activity: ActivityId, timeout: Option<SimTime>) -> Result<(), ActorError> {
        self.wait_for_as(activity, timeout, None).await
    }

    /// `wait_for` with a [`VisibleKind`] attached (spec §4.H): the one place
    /// a blocking wait's observer actually gets built, since `wait_for`
    /// itself is shared by every primitive that parks this way.
    async fn wait_for_as(&self, activity: ActivityId, timeout: Option<SimTime>, kind: Option<VisibleKind>) -> Result<(), ActorError> {
        let actor = self.actor;
        let observer: Option<Box<dyn SimcallObserver>> = kind.map(|k| Box::new(BasicObserver::new(k)) as Box<dyn SimcallObserver>);
        self.issue_blocking(observer, move |engine| {
            crate::activity::wait_for(engine, activity, actor, timeout);
        })
        .await
    }

    /// `wait_any(set, timeout)` (spec §4.C, §4.H): returns the index within
    /// `activities` of the one that completed, or propagates its exception
    /// (e.g. `Timeout` per scenario S3, whose waitany observer result is
    /// always −1 on that path).
    pub async fn wait_any(&self, activities: Vec<ActivityId>, timeout: Option<SimTime>) -> Result<i64, ActorError> {
        let actor = self.actor;
        let acts = activities.clone();
        let observer = Box::new(BasicObserver::with_max_consider(VisibleKind::WaitAny, activities.len() + 1));
        self.issue_blocking(Some(observer), move |engine| {
            let index = crate::activity::test_any(engine, &acts, actor);
            if index >= 0 {
                if let Some(record) = engine.actors.get_mut(actor) {
                    record.wait_any_result = Some(index);
                }
            } else {
                crate::activity::wait_any_for(engine, &acts, actor, timeout);
            }
        })
        .await?;
        Ok(self.engine.borrow_mut().actors.get_mut(actor).and_then(|a| a.wait_any_result.take()).unwrap_or(-1))
    }

    /// `test(issuer)` (spec §4.C): non-blocking, no yield required since it
    /// never parks. `VisibleKind::CommTest` has no call site: this never
    /// goes through `issue_answered`/`issue_blocking`, so there is no
    /// `Simcall` to attach an observer to.
    pub fn test(&self, activity: ActivityId) -> bool {
        let mut engine = self.engine.borrow_mut();
        crate::activity::test(&mut engine, activity, self.actor)
    }

    /// `test_any(set)` (spec §4.C). Same story as [`ActorContext::test`]:
    /// `VisibleKind::TestAny` exists for the checker's benefit but this
    /// synchronous call never dispatches a `Simcall`, so it has no observer
    /// to drive.
    pub fn test_any(&self, activities: &[ActivityId]) -> i64 {
        let mut engine = self.engine.borrow_mut();
        crate::activity::test_any(&mut engine, activities, self.actor)
    }

    /// `cancel()` on any activity handle owned by this actor.
    pub fn cancel(&self, activity: ActivityId) {
        let mut engine = self.engine.borrow_mut();
        crate::activity::cancel(&mut engine, activity);
    }

    /// `sleep(duration)` (spec §4.F, §6.2): a pure time delay on this
    /// actor's own host.
    pub async fn sleep(&self, duration: SimTime) -> Result<(), ActorError> {
        let host = self.host();
        let actor = self.actor;
        let id = self
            .issue_answered(None, move |engine| {
                let id = crate::exec::new_sleep(engine, host, duration, actor);
                crate::exec::sleep::start(engine, id, actor);
                id
            })
            .await?;
        self.wait_for_as(id, None, Some(VisibleKind::ActorSleep)).await
    }

    /// `exec(flops)` (spec §4.F) on this actor's own host. No `VisibleKind`
    /// variant names compute activities, so this carries no observer.
    pub async fn exec(&self, flops: f64, bound: Option<f64>) -> Result<(), ActorError> {
        let host = self.host();
        let actor = self.actor;
        let id = self
            .issue_answered(None, move |engine| {
                let id = crate::exec::new_exec(engine, host, flops, None, bound, actor);
                crate::exec::exec::start(engine, id, actor);
                id
            })
            .await?;
        self.wait_for(id, None).await
    }

    /// `lock()` (spec §4.D, §6.2): `lock_async` then `wait_for` the
    /// resulting acquisition. Timeouts are refused at compile time for
    /// mutex acquisitions (spec §9 open question 1) — there is deliberately
    /// no timeout parameter here.
    pub async fn lock(&self, mutex: MutexId) -> Result<(), ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::MutexLockAsync));
        let id = self.issue_answered(Some(observer), move |engine| crate::sync::mutex::lock_async(engine, mutex, actor)).await?;
        self.wait_for_as(id, None, Some(VisibleKind::MutexWait)).await
    }

    /// `try_lock()` (spec §4.D, §6.2).
    pub async fn try_lock(&self, mutex: MutexId) -> Result<bool, ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::MutexTryLock));
        self.issue_answered(Some(observer), move |engine| crate::sync::mutex::try_lock(engine, mutex, actor)).await
    }

    /// `unlock()` (spec §4.D, §6.2).
    pub async fn unlock(&self, mutex: MutexId) -> Result<(), ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::MutexUnlock));
        let result = self.issue_answered(Some(observer), move |engine| crate::sync::mutex::unlock(engine, mutex, actor)).await?;
        result.map_err(ActorError::from)
    }

    /// `acquire()` on a semaphore (spec §4.D, §6.2).
    pub async fn sem_acquire(&self, sem: SemaphoreId) -> Result<(), ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::SemLock));
        let id = self.issue_answered(Some(observer), move |engine| crate::sync::semaphore::acquire_async(engine, sem, actor)).await?;
        self.wait_for_as(id, None, Some(VisibleKind::SemWait)).await
    }

    /// `release()` on a semaphore (spec §4.D, §6.2).
    pub async fn sem_release(&self, sem: SemaphoreId) -> Result<(), ActorError> {
        let observer = Box::new(BasicObserver::new(VisibleKind::SemUnlock));
        self.issue_answered(Some(observer), move |engine| crate::sync::semaphore::release(engine, sem)).await
    }

    /// `acquire()` on a barrier (spec §4.D, §6.2). No timeout parameter, for
    /// the same reason as [`ActorContext::lock`].
    pub async fn barrier_wait(&self, barrier: BarrierId) -> Result<(), ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::BarrierLock));
        let id = self.issue_answered(Some(observer), move |engine| crate::sync::barrier::acquire_async(engine, barrier, actor)).await?;
        self.wait_for_as(id, None, Some(VisibleKind::BarrierWait)).await
    }

    /// `wait(cond, mutex, [timeout])` (spec §4.D, §6.2): unlocks `mutex`,
    /// parks until `signal`/`broadcast`, re-locks `mutex` before returning.
    /// On timeout the acquisition is pulled out of the condvar's queue and
    /// the mutex is re-acquired on a best-effort basis (see DESIGN.md: a
    /// contended re-lock on a timed-out wait is a documented gap, same as
    /// the one already noted for `signal()`).
    pub async fn condvar_wait(&self, condvar: CondvarId, mutex: MutexId, timeout: Option<SimTime>) -> Result<(), ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::CondvarLockAsync));
        let id = self
            .issue_answered(Some(observer), move |engine| crate::sync::condvar::acquire_async(engine, condvar, actor, mutex))
            .await??;
        let result = self.wait_for_as(id, timeout, Some(VisibleKind::CondvarWait)).await;
        if let Err(ActorError::Kernel(KernelError::Timeout(_))) = &result {
            let mut engine = self.engine.borrow_mut();
            if let Some(c) = engine.condvars.get_mut(condvar) {
                c.queue.retain(|&queued| queued != id);
            }
            crate::sync::mutex::lock_async(&mut engine, mutex, actor);
        }
        result
    }

    /// `notify_one()` (spec §4.D, §6.2).
    pub async fn condvar_signal(&self, condvar: CondvarId) -> Result<(), ActorError> {
        let observer = Box::new(BasicObserver::new(VisibleKind::CondvarSignal));
        self.issue_answered(Some(observer), move |engine| crate::sync::condvar::signal(engine, condvar)).await
    }

    /// `notify_all()` (spec §4.D, §6.2).
    pub async fn condvar_broadcast(&self, condvar: CondvarId) -> Result<(), ActorError> {
        let observer = Box::new(BasicObserver::new(VisibleKind::CondvarBroadcast));
        self.issue_answered(Some(observer), move |engine| crate::sync::condvar::broadcast(engine, condvar)).await
    }

    /// `mailbox(name).put(payload, bytes)` direct-host variant (spec §6.2
    /// "sendto(from, to, bytes)"): constructs and starts a send, then waits
    /// on it.
    pub async fn send(&self, req: crate::comm::CommRequest) -> Result<(), ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::CommAsync));
        let id = self.issue_answered(Some(observer), move |engine| crate::comm::isend(engine, actor, req)).await?;
        self.wait_for_as(id, None, Some(VisibleKind::CommWait)).await
    }

    /// `mailbox(name).get()` (spec §6.2): blocks until matched with a sender,
    /// then returns whatever `copy_data()` left in the comm's payload slot
    /// (identity if the request carried no `copy_fn`).
    pub async fn recv(&self, req: crate::comm::CommRequest) -> Result<Box<dyn std::any::Any>, ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::CommAsync));
        let id = self.issue_answered(Some(observer), move |engine| crate::comm::irecv(engine, actor, req)).await?;
        self.wait_for_as(id, None, Some(VisibleKind::CommWait)).await?;
        let payload = self.engine.borrow_mut().activities.get_mut(id).and_then(|record| match record {
            crate::activity::ActivityRecord::Comm(body) => body.payload.take(),
            _ => None,
        });
        payload.ok_or_else(|| ActorError::Kernel(KernelError::Assertion("recv completed with no payload".into())))
    }

    /// `iput(payload)` on a message queue (spec §4.E, §6.2): blocks until
    /// matched with a pending `iget`. No `VisibleKind` variant covers message
    /// queues, so this carries no observer.
    pub async fn mess_put(&self, queue: crate::util::MessageQueueId, payload: Box<dyn std::any::Any>) -> Result<(), ActorError> {
        let actor = self.actor;
        let id = self.issue_answered(None, move |engine| crate::comm::iput(engine, queue, actor, payload)).await?;
        self.wait_for(id, None).await
    }

    /// `iget()` on a message queue (spec §4.E, §6.2): blocks until matched
    /// with a pending `iput`, then returns the delivered payload.
    pub async fn mess_get(&self, queue: crate::util::MessageQueueId) -> Result<Box<dyn std::any::Any>, ActorError> {
        let actor = self.actor;
        let id = self.issue_answered(None, move |engine| crate::comm::iget(engine, queue, actor)).await?;
        self.wait_for(id, None).await?;
        let payload = self.engine.borrow_mut().activities.get_mut(id).and_then(|record| match record {
            crate::activity::ActivityRecord::Mess(body) => body.payload.take(),
            _ => None,
        });
        payload.ok_or_else(|| ActorError::Kernel(KernelError::Assertion("mess_get completed with no payload".into())))
    }

    /// `random(a, b)` (spec §4.H): the canonical visible simcall — its
    /// observer reports `b - a + 1` outcomes. When a model checker is
    /// attached, `prepare` is called on construction (before this simcall is
    /// even dispatched) and its forced outcome, not the RNG, decides the
    /// result — `engine.roll_random` only ever runs on the non-model-checked
    /// path.
    pub async fn random(&self, low: i64, high: i64) -> Result<i64, ActorError> {
        let mut observer = BasicObserver::with_max_consider(VisibleKind::Random, (high - low + 1).max(1) as usize);
        let forced = if self.engine.borrow().model_checker_active() {
            observer.prepare(0);
            observer.prepared_outcome()
        } else {
            None
        };
        self.issue_answered(Some(Box::new(observer)), move |engine| match forced {
            Some(k) => (low + k as i64).min(high),
            None => engine.roll_random(low, high),
        })
        .await
    }

    /// `spawn(code)` on this actor's own host (spec §4.G, §6.2).
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, body: F) -> ActorId
    where
        F: FnOnce(ActorContext) -> Fut + 'static,
        Fut: std::future::Future<Output = ()> + 'static,
    {
        let host = self.host();
        let mut engine = self.engine.borrow_mut();
        engine.spawn_actor(name.into(), host, self.engine.clone(), body)
    }

    /// `kill(actor)` (spec §4.G, §6.2).
    pub fn kill(&self, target: ActorId) {
        let mut engine = self.engine.borrow_mut();
        engine.kill_actor(target);
    }

    /// `join(actor)` (spec §4.G, §6.2): wait for `target` to terminate.
    pub async fn join(&self, target: ActorId) -> Result<(), ActorError> {
        let actor = self.actor;
        let observer = Box::new(BasicObserver::new(VisibleKind::ActorJoin));
        self.issue_blocking(Some(observer), move |engine| {
            engine.join_actor(target, actor);
        })
        .await
    }

    /// `suspend()`/`resume()` (spec §4.G, §6.2) on this actor itself.
    pub fn suspend_self(&self) {
        let mut engine = self.engine.borrow_mut();
        if let Some(record) = engine.actors.get_mut(self.actor) {
            record.suspended = true;
        }
    }

    pub fn resume_actor(&self, target: ActorId) {
        let mut engine = self.engine.borrow_mut();
        engine.resume_actor(target);
    }

    /// `daemonize()` (spec §6.2): a daemon actor does not keep the
    /// simulation alive on its own once every non-daemon actor has exited.
    pub fn daemonize(&self) {
        let mut engine = self.engine.borrow_mut();
        if let Some(record) = engine.actors.get_mut(self.actor) {
            record.daemon = true;
        }
    }

    /// `set_host(host)` (spec §6.2).
    pub fn set_host(&self, host: HostId) {
        let mut engine = self.engine.borrow_mut();
        if let Some(record) = engine.actors.get_mut(self.actor) {
            record.host = host;
        }
    }

    /// `on_exit(callback)` (spec §3, §4.G, §6.2): registers a callback run
    /// once this actor terminates or is killed, in registration order.
    pub fn on_exit(&self, callback: impl FnOnce(&mut EngineInner) + 'static) {
        let mut engine = self.engine.borrow_mut();
        if let Some(record) = engine.actors.get_mut(self.actor) {
            record.on_exit.push(Box::new(callback));
        }
    }
}
