//! Scenario S6 (spec §8): timers that share a due date fire in the order
//! they were inserted, never in date-only order — the tie-break is the
//! insertion sequence, not anything sourced from outside the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use simkern::time::TimerHeap;

#[test]
fn timers_due_on_the_same_date_fire_in_insertion_order() {
    let fired: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let mut heap = TimerHeap::new();

    let f1 = fired.clone();
    heap.set(1.0, move |_id| f1.borrow_mut().push("a"));
    let f2 = fired.clone();
    heap.set(1.0, move |_id| f2.borrow_mut().push("b"));
    let f3 = fired.clone();
    heap.set(0.5, move |_id| f3.borrow_mut().push("c"));

    assert!(heap.fire_due(2.0));
    assert_eq!(*fired.borrow(), vec!["c", "a", "b"]);
}
