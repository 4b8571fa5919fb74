//! Cooperative context switching (spec §4.A).
//!
//! Actor bodies are `async fn`s compiled to futures; there is no tokio
//! reactor and no OS thread per actor. [`Suspend`] is the one suspension
//! point — `.await`ing it is `yield()`. The first poll always returns
//! `Pending`, handing control back to whichever `resume()` call is driving
//! the actor's body future; the second poll (the next time maestro resumes
//! that same body) checks the actor's kill flag and resolves, exactly like a
//! stackful coroutine's single `yield`/`resume` pair without any
//! stack-switching code.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};

use crate::engine::EngineInner;
use crate::error::ForcefulKill;
use crate::util::ActorId;

/// The body an actor runs, boxed so the scheduler can hold heterogeneous
/// actor code behind one type in its arena.
pub type ActorBody = Pin<Box<dyn Future<Output = ()>>>;

/// `yield()` (spec §4.A). Resolves to `Err(ForcefulKill)` if `wants_to_die`
/// became true on this actor while it was parked.
pub struct Suspend {
    engine: Rc<RefCell<EngineInner>>,
    actor: ActorId,
    yielded: bool,
}

impl Future for Suspend {
    type Output = Result<(), ForcefulKill>;

    fn poll(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if !this.yielded {
            this.yielded = true;
            return Poll::Pending;
        }
        let killed = this
            .engine
            .borrow()
            .actors
            .get(this.actor)
            .map(|a| a.wants_to_die)
            .unwrap_or(true);
        if killed {
            Poll::Ready(Err(ForcefulKill))
        } else {
            Poll::Ready(Ok(()))
        }
    }
}

/// Build a fresh suspension point for `actor`. Every call to a
/// simcall-issuing [`crate::actor::ActorContext`] method creates exactly one
/// of these and awaits it exactly once (spec §5 "exclusively at `yield()`").
pub fn yield_now(engine: Rc<RefCell<EngineInner>>, actor: ActorId) -> Suspend {
    Suspend {
        engine,
        actor,
        yielded: false,
    }
}

/// Poll `body` once without holding any borrow of the engine. Returns
/// `true` iff the body future has completed (the actor function returned).
pub fn poll_actor(body: &mut ActorBody) -> bool {
    let waker = futures::task::noop_waker();
    let mut cx = TaskContext::from_waker(&waker);
    matches!(body.as_mut().poll(&mut cx), Poll::Ready(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn suspend_is_pending_once_then_ready() {
        let engine = Rc::new(RefCell::new(EngineInner::new(EngineConfig::default())));
        let actor = engine.borrow_mut().spawn_bare_actor();

        let waker = futures::task::noop_waker();
        let mut cx = TaskContext::from_waker(&waker);

        let mut suspend = yield_now(engine, actor);
        assert!(matches!(Pin::new(&mut suspend).poll(&mut cx), Poll::Pending));
        assert!(matches!(Pin::new(&mut suspend).poll(&mut cx), Poll::Ready(Ok(()))));
    }

    #[test]
    fn suspend_resolves_to_killed_once_marked() {
        let engine = Rc::new(RefCell::new(EngineInner::new(EngineConfig::default())));
        let actor = engine.borrow_mut().spawn_bare_actor();

        let waker = futures::task::noop_waker();
        let mut cx = TaskContext::from_waker(&waker);

        let mut suspend = yield_now(engine.clone(), actor);
        let _ = Pin::new(&mut suspend).poll(&mut cx);
        engine.borrow_mut().actors.get_mut(actor).unwrap().wants_to_die = true;
        assert!(matches!(Pin::new(&mut suspend).poll(&mut cx), Poll::Ready(Err(ForcefulKill))));
    }
}
