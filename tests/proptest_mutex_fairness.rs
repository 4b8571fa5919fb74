//! Property: for any number of actors contending on one mutex from the same
//! host with no other scheduling pressure between them, the FIFO wait queue
//! grants the lock in spawn order every time — the fairness guarantee
//! scenario S2 checks by hand for a fixed five actors, checked here across a
//! randomized actor count.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use simkern::prelude::*;

proptest! {
    #[test]
    fn n_actors_acquire_a_mutex_in_spawn_order(n in 2usize..8) {
        let engine = Engine::new_for_tests();
        let host = engine.new_host("host");
        let mutex = engine.with_inner_mut(|inner| inner.mutexes.insert(Mutex::new(false)));
        let log: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));

        for i in 0..n {
            let log = log.clone();
            engine.spawn(format!("actor-{i}"), host, move |ctx: ActorContext| async move {
                ctx.lock(mutex).await.expect("lock acquired");
                log.borrow_mut().push(i);
                ctx.unlock(mutex).await.expect("unlock succeeds");
            });
        }

        engine.run();

        let expected: Vec<usize> = (0..n).collect();
        prop_assert_eq!(log.borrow().clone(), expected);
    }
}
