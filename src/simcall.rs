//! Simcall requests and the model-checker observer protocol (spec §4.H).
//!
//! A simcall is the one kind of request that must execute in kernel mode:
//! user code assembles one, stores it on its own actor record, and yields.
//! Maestro reads `kind` back out and dispatches the attached closure against
//! `&mut EngineInner`.

use crate::util::ActorId;

/// Where a dispatched simcall leaves its issuer (spec §3 "Simcall", §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimcallKind {
    /// No simcall currently pending.
    None,
    /// The closure runs and the issuer is pushed back onto the runnable
    /// queue this same round.
    RunAnswered,
    /// The closure runs; it is responsible for eventually arranging for the
    /// issuer to become runnable again, directly or via a later
    /// `finish()`/timer callback.
    RunBlocking,
}

/// The bounded set of simcall kinds visible to a model checker (spec §4.H).
/// Everything else (construction, `start()`, `finish()`, ...) is dispatched
/// eagerly with no observer at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VisibleKind {
    Random,
    CommAsync,
    CommTest,
    CommWait,
    TestAny,
    WaitAny,
    MutexLockAsync,
    MutexWait,
    MutexUnlock,
    MutexTryLock,
    SemLock,
    SemUnlock,
    SemWait,
    BarrierLock,
    BarrierWait,
    CondvarLockAsync,
    CondvarWait,
    CondvarSignal,
    CondvarBroadcast,
    ActorJoin,
    ActorExit,
    ActorSleep,
    ActorCreate,
    ObjectAccess,
}

/// A serialization sink for [`SimcallObserver::serialize`] (spec §6.3): a
/// byte-level channel to the model-checker application side. The socket
/// itself is out of scope (spec §1); this crate only needs observers
/// capable of writing to one.
pub trait McChannel {
    fn write_u8(&mut self, byte: u8);
    fn write_u64(&mut self, value: u64);
    fn write_f64(&mut self, value: f64);
    fn write_bool(&mut self, value: bool);
    fn write_str(&mut self, value: &str);
}

/// An in-memory [`McChannel`] sufficient for this crate's own tests, and a
/// reasonable starting point for a real wire implementation.
#[derive(Debug, Default)]
pub struct BufferChannel {
    pub bytes: Vec<u8>,
}

impl McChannel for BufferChannel {
    fn write_u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }
    fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }
    fn write_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }
    fn write_bool(&mut self, value: bool) {
        self.bytes.push(value as u8);
    }
    fn write_str(&mut self, value: &str) {
        self.write_u64(value.len() as u64);
        self.bytes.extend_from_slice(value.as_bytes());
    }
}

/// The model-checker observer attached to a visible simcall (spec §4.H).
pub trait SimcallObserver {
    fn kind(&self) -> VisibleKind;

    /// Whether scheduling this actor now would actually make progress.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Number of distinct outcomes this simcall has (e.g. `random(a, b)`
    /// reports `b - a + 1`; `wait_any` reports ready-count + 1).
    fn get_max_consider(&self) -> usize {
        1
    }

    /// Force this simcall to produce its `k`-th outcome before the kernel
    /// executes it.
    fn prepare(&mut self, times_considered: usize);

    /// Write a tag + parameters sufficient for the checker to rebuild a
    /// transition object on its side (spec §6.3).
    fn serialize(&self, channel: &mut dyn McChannel) {
        channel.write_u8(self.kind() as u8);
    }

    /// Whether this simcall should be enrolled in exploration at all.
    fn is_visible(&self) -> bool {
        true
    }

    /// Record the outcome once the kernel has executed the simcall (used by
    /// delayed simcalls like `wait_any`, whose index is known only after
    /// dispatch).
    fn set_result(&mut self, result: i64);

    /// The outcome previously recorded by [`SimcallObserver::set_result`].
    fn get_result(&self) -> Option<i64>;
}

/// A minimal concrete [`SimcallObserver`], sufficient when no model checker
/// is attached and the kernel just runs in-process: constant
/// `max_consider`, records whatever `prepare`/`set_result` report.
pub struct BasicObserver {
    kind: VisibleKind,
    max_consider: usize,
    prepared: Option<usize>,
    result: Option<i64>,
}

impl BasicObserver {
    pub fn new(kind: VisibleKind) -> Self {
        Self {
            kind,
            max_consider: 1,
            prepared: None,
            result: None,
        }
    }

    pub fn with_max_consider(kind: VisibleKind, max_consider: usize) -> Self {
        Self {
            kind,
            max_consider,
            prepared: None,
            result: None,
        }
    }

    pub fn prepared_outcome(&self) -> Option<usize> {
        self.prepared
    }
}

impl SimcallObserver for BasicObserver {
    fn kind(&self) -> VisibleKind {
        self.kind
    }

    fn get_max_consider(&self) -> usize {
        self.max_consider
    }

    fn prepare(&mut self, times_considered: usize) {
        self.prepared = Some(times_considered);
    }

    fn set_result(&mut self, result: i64) {
        self.result = Some(result);
    }

    fn get_result(&self) -> Option<i64> {
        self.result
    }
}

/// A kernel request attached to exactly one actor at a time (spec §3
/// "Simcall").
pub struct Simcall {
    pub kind: SimcallKind,
    pub issuer: ActorId,
    pub observer: Option<Box<dyn SimcallObserver>>,
    pub closure: Option<Box<dyn FnOnce(&mut crate::engine::EngineInner)>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_observer_reports_prepared_outcome() {
        let mut observer = BasicObserver::with_max_consider(VisibleKind::Random, 4);
        assert_eq!(observer.get_max_consider(), 4);
        observer.prepare(2);
        assert_eq!(observer.prepared_outcome(), Some(2));
    }

    #[test]
    fn buffer_channel_round_trips_a_tag_byte() {
        let mut channel = BufferChannel::default();
        let observer = BasicObserver::new(VisibleKind::CommWait);
        observer.serialize(&mut channel);
        assert_eq!(channel.bytes, vec![VisibleKind::CommWait as u8]);
    }
}
