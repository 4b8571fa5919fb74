//! Scenario S4 (spec §8): a consumer waits on a condition variable for a
//! producer to set a flag. The consumer must wake holding the mutex again
//! and observe the flag exactly once nothing is lost between `unlock()` and
//! `signal()`.

use std::cell::RefCell;
use std::rc::Rc;

use simkern::prelude::*;

#[test]
fn consumer_wakes_after_producer_sets_flag_and_signals() {
    let engine = Engine::new_for_tests();
    let host = engine.new_host("host");
    let mutex = engine.with_inner_mut(|inner| inner.mutexes.insert(Mutex::new(false)));
    let condvar = engine.with_inner_mut(|inner| inner.condvars.insert(Condvar::new()));

    let flag: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let flag_for_consumer = flag.clone();
    let log_for_consumer = log.clone();
    engine.spawn("consumer", host, move |ctx: ActorContext| async move {
        ctx.lock(mutex).await.expect("initial lock");
        while !*flag_for_consumer.borrow() {
            ctx.condvar_wait(condvar, mutex, None).await.expect("condvar wait");
        }
        log_for_consumer.borrow_mut().push("consumer-saw-flag");
        ctx.unlock(mutex).await.expect("unlock after wake");
    });

    let flag_for_producer = flag.clone();
    engine.spawn("producer", host, move |ctx: ActorContext| async move {
        ctx.lock(mutex).await.expect("producer lock");
        *flag_for_producer.borrow_mut() = true;
        ctx.unlock(mutex).await.expect("producer unlock");
        ctx.condvar_signal(condvar).await.expect("signal");
    });

    engine.run();

    assert!(*flag.borrow());
    assert_eq!(*log.borrow(), vec!["consumer-saw-flag"]);
    assert_eq!(engine.now(), 0.0);
}
