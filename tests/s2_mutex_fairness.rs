//! Scenario S2 (spec §8): five actors contend for one mutex in spawn order;
//! each holds it for one second. FIFO queueing means they must acquire, log,
//! and release strictly in spawn order, finishing at t=5.0.

use std::cell::RefCell;
use std::rc::Rc;

use simkern::prelude::*;

#[test]
fn five_actors_acquire_a_mutex_in_fifo_order() {
    let engine = Engine::new_for_tests();
    let host = engine.new_host("host");
    let mutex = engine.with_inner_mut(|inner| inner.mutexes.insert(Mutex::new(false)));

    let log: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));

    for i in 1..=5 {
        let log = log.clone();
        engine.spawn(format!("actor-{i}"), host, move |ctx: ActorContext| async move {
            ctx.lock(mutex).await.expect("lock acquired");
            log.borrow_mut().push(i);
            ctx.sleep(1.0).await.expect("sleep completes");
            ctx.unlock(mutex).await.expect("unlock succeeds");
        });
    }

    engine.run();

    assert_eq!(*log.borrow(), vec![1, 2, 3, 4, 5]);
    assert!((engine.now() - 5.0).abs() < 1e-9, "now={}", engine.now());
}
