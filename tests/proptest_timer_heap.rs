//! Property: for any sequence of timer insertions, `fire_due` always fires
//! them in `(date, insertion_seq)` order — the same stable-sort tie-break
//! scenario S6 pins down by hand, checked here across randomized inputs.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use simkern::time::TimerHeap;

proptest! {
    #[test]
    fn fires_in_date_then_insertion_order(dates in prop::collection::vec(0.0f64..100.0, 1..40)) {
        let fired: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
        let mut heap = TimerHeap::new();

        for (i, &date) in dates.iter().enumerate() {
            let f = fired.clone();
            heap.set(date, move |_id| f.borrow_mut().push(i));
        }

        heap.fire_due(f64::MAX);

        let mut expected: Vec<usize> = (0..dates.len()).collect();
        expected.sort_by(|&a, &b| dates[a].partial_cmp(&dates[b]).unwrap().then(a.cmp(&b)));

        prop_assert_eq!(fired.borrow().clone(), expected);
    }
}
