//! Ordered map from `(date, insertion_seq)` to callback (spec §4.B).

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::time::SimTime;
use crate::util::arena::{Arena, Id};
use crate::util::ids::TimerMarker;

pub use crate::util::ids::TimerId;

/// `f64` ordering wrapper. Simulated dates are never produced from NaN
/// arithmetic (resource models deal in finite costs/rates), so panicking on
/// an unorderable comparison here would indicate a bug upstream, not a
/// legitimate runtime condition to recover from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedTime(SimTime);

impl Eq for OrderedTime {}
impl PartialOrd for OrderedTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

struct Entry {
    callback: Option<Box<dyn FnOnce(TimerId)>>,
}

/// Ordered `(date, insertion_seq) -> callback` map driving scheduled
/// wake-ups: timeouts, and anything else that needs to fire at a future
/// simulated date.
///
/// Ties on `date` are broken by insertion order (spec §4.B, §8 scenario S6),
/// which the `(OrderedTime, seq)` heap key encodes directly.
pub struct TimerHeap {
    heap: BinaryHeap<Reverse<(OrderedTime, u64, TimerId)>>,
    entries: Arena<Entry, TimerMarker>,
    next_seq: u64,
}

impl Default for TimerHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerHeap {
    /// Create an empty timer heap.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            entries: Arena::new(),
            next_seq: 0,
        }
    }

    /// Insert a timer firing at `date`, returning a handle usable with
    /// [`TimerHeap::cancel`]. O(log n).
    ///
    /// The callback receives its own [`TimerId`] when it fires, so callers
    /// that need to correlate the firing with bookkeeping keyed on that id
    /// (the engine's `timer_actions` side table, for instance) don't have to
    /// thread it through a second channel.
    pub fn set(&mut self, date: SimTime, callback: impl FnOnce(TimerId) + 'static) -> TimerId {
        let id = self.entries.insert(Entry {
            callback: Some(Box::new(callback)),
        });
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((OrderedTime(date), seq, id)));
        id
    }

    /// Cancel a previously set timer. Idempotent: canceling an id that has
    /// already fired (or was already canceled) is a no-op.
    pub fn cancel(&mut self, handle: TimerId) {
        self.entries.remove(handle);
    }

    /// The date of the next still-pending timer, if any. O(1).
    pub fn peek_next_date(&self) -> Option<SimTime> {
        self.heap
            .peek()
            .map(|Reverse((OrderedTime(date), _, _))| *date)
    }

    /// Pop and run every timer due at or before `now`, in ascending
    /// `(date, insertion_seq)` order. Returns `true` iff at least one
    /// callback ran.
    ///
    /// Callbacks may insert new timers; if the new timer's date is `<= now`
    /// it is drained in this same call (tail-recursive draining, spec §4.B),
    /// otherwise it waits for a future `fire_due` call.
    pub fn fire_due(&mut self, now: SimTime) -> bool {
        let mut fired_any = false;
        loop {
            let due = matches!(self.heap.peek(), Some(Reverse((OrderedTime(date), _, _))) if *date <= now);
            if !due {
                break;
            }
            let Reverse((_, _, id)) = self.heap.pop().expect("peek confirmed an element");
            let Some(entry) = self.entries.remove(id) else {
                // Already canceled: the heap entry is a tombstone, skip it.
                continue;
            };
            if let Some(callback) = entry.callback {
                callback(id);
                fired_any = true;
            }
        }
        fired_any
    }

    /// Number of timers still pending (not yet fired or canceled).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff no timers are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Workaround: `Id<K>` derives `Copy`/`Eq`/`Hash` generically, but the heap
// key tuple needs `Ord`; provide it here since `TimerId` itself never needs
// a total order outside this module.
impl Ord for Id<TimerMarker> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.serial().cmp(&other.serial())
    }
}
impl PartialOrd for Id<TimerMarker> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn fires_in_date_then_insertion_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut heap = TimerHeap::new();

        let l1 = log.clone();
        heap.set(1.0, move |_id| l1.borrow_mut().push("a"));
        let l2 = log.clone();
        heap.set(1.0, move |_id| l2.borrow_mut().push("b"));
        let l3 = log.clone();
        heap.set(0.5, move |_id| l3.borrow_mut().push("c"));

        heap.fire_due(2.0);
        assert_eq!(*log.borrow(), vec!["c", "a", "b"]);
    }

    #[test]
    fn does_not_fire_future_timers() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut heap = TimerHeap::new();
        let l = log.clone();
        heap.set(5.0, move |_id| l.borrow_mut().push("late"));

        assert!(!heap.fire_due(1.0));
        assert!(log.borrow().is_empty());
        assert_eq!(heap.peek_next_date(), Some(5.0));
    }

    #[test]
    fn cancel_is_idempotent_and_prevents_firing() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut heap = TimerHeap::new();
        let l = log.clone();
        let handle = heap.set(1.0, move |_id| l.borrow_mut().push("x"));

        heap.cancel(handle);
        heap.cancel(handle); // idempotent

        assert!(!heap.fire_due(10.0));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn fire_due_called_twice_at_same_t_only_fires_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut heap = TimerHeap::new();
        let l = log.clone();
        heap.set(1.0, move |_id| l.borrow_mut().push("x"));

        assert!(heap.fire_due(1.0));
        assert!(!heap.fire_due(1.0));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn callback_inserting_due_timer_drains_in_same_call() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let heap = Rc::new(RefCell::new(TimerHeap::new()));

        let l = log.clone();
        let h = heap.clone();
        heap.borrow_mut().set(1.0, move |_id| {
            l.borrow_mut().push("first");
            let l2 = l.clone();
            h.borrow_mut().set(1.0, move |_id| l2.borrow_mut().push("second"));
        });

        heap.borrow_mut().fire_due(1.0);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn peek_next_date_reflects_earliest_pending() {
        let mut heap = TimerHeap::new();
        assert_eq!(heap.peek_next_date(), None);
        heap.set(3.0, |_id| {});
        heap.set(1.0, |_id| {});
        assert_eq!(heap.peek_next_date(), Some(1.0));
    }
}
