//! The engine-wide signal bus (spec §4.G ambient design), generalized from
//! the teacher's `monitoring::{Monitor, ActorEvent}` shape: instead of an
//! async, `Arc`-shared, generic-over-event-type trait, a kernel running on a
//! single `Rc<RefCell<_>>` only needs a plain `&mut self` callback fired
//! synchronously from maestro, in subscriber registration order.

use crate::simcall::VisibleKind;
use crate::util::{ActorId, HostId};

/// Everything the engine reports to subscribers over its lifetime. Closed
/// set, unlike the teacher's open `MonitoringEvent` trait: this kernel has
/// no plugin boundary for new signal kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    ActorSpawned { actor: ActorId, name: String },
    ActorTerminated { actor: ActorId },
    ActorKilled { actor: ActorId },
    ActorRestarted {
        actor: ActorId,
        original_name: String,
        restart_count: u32,
    },
    HostStateChanged { host: HostId, up: bool },
    /// A visible simcall's observer finished dispatch (spec §4.H, §6.3).
    /// `bytes` is whatever `SimcallObserver::serialize` wrote; a model
    /// checker subscribing over its own channel is the only intended
    /// consumer, so this crate does nothing with the bytes besides hand
    /// them off.
    SimcallObserved {
        actor: ActorId,
        kind: VisibleKind,
        bytes: Vec<u8>,
    },
}

/// Observer attached to an [`super::Engine`] via [`super::Engine::subscribe`].
/// Fired only from maestro context (never from inside a simcall closure
/// mid-dispatch), so implementations never see a half-applied state change.
pub trait EngineObserver {
    fn on_signal(&mut self, signal: &EngineSignal);
}

/// Records every signal it sees, in order. Analogous to the teacher's
/// `InMemoryMonitor`, minus the atomics and severity filtering this kernel
/// has no use for.
#[derive(Debug, Default)]
pub struct InMemoryObserver {
    pub history: Vec<EngineSignal>,
}

impl InMemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngineObserver for InMemoryObserver {
    fn on_signal(&mut self, signal: &EngineSignal) {
        self.history.push(signal.clone());
    }
}

/// Discards every signal. The zero-overhead default when nothing is
/// watching.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {
    fn on_signal(&mut self, _signal: &EngineSignal) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::arena::Arena;
    use crate::util::ids::ActorMarker;

    #[test]
    fn in_memory_observer_records_in_order() {
        let mut arena: Arena<(), ActorMarker> = Arena::new();
        let a1 = arena.insert(());
        let a2 = arena.insert(());
        let mut observer = InMemoryObserver::new();
        observer.on_signal(&EngineSignal::ActorSpawned { actor: a1, name: "one".into() });
        observer.on_signal(&EngineSignal::ActorSpawned { actor: a2, name: "two".into() });
        assert_eq!(observer.history.len(), 2);
    }

    #[test]
    fn noop_observer_drops_everything() {
        let mut arena: Arena<(), ActorMarker> = Arena::new();
        let a1 = arena.insert(());
        let mut observer = NoopObserver;
        observer.on_signal(&EngineSignal::ActorKilled { actor: a1 });
    }
}
