//! Scenario S3 (spec §8): an actor waits on a set of two activities — an
//! unmatched mailbox receive and a ten-second sleep — with a three-second
//! timeout. Neither activity ever completes in time, so `wait_any` must
//! surface a `Timeout` error at t=3.0, and the observer-visible result
//! recorded on the actor must be -1.

use std::cell::RefCell;
use std::rc::Rc;

use simkern::comm::{irecv, CommRequest};
use simkern::exec;
use simkern::prelude::*;

#[test]
fn wait_any_times_out_when_nothing_in_the_set_completes() {
    let engine = Engine::new_for_tests();
    let host = engine.new_host("host");

    let result: Rc<RefCell<Option<Result<i64, ActorError>>>> = Rc::new(RefCell::new(None));
    let result_for_body = result.clone();
    let ids: Rc<RefCell<Option<(ActivityId, ActivityId)>>> = Rc::new(RefCell::new(None));
    let ids_for_body = ids.clone();

    let actor = engine.spawn("waiter", host, move |ctx: ActorContext| async move {
        let (comm_id, sleep_id) = ids_for_body.borrow_mut().take().expect("activity ids set before run");
        let outcome = ctx.wait_any(vec![comm_id, sleep_id], Some(3.0)).await;
        *result_for_body.borrow_mut() = Some(outcome);
    });

    let (comm_id, sleep_id) = engine.with_inner_mut(|inner| {
        let mailbox = inner.mailboxes.insert(simkern::comm::Mailbox::new());
        let comm_id = irecv(
            inner,
            actor,
            CommRequest {
                mailbox,
                size: 1e6,
                rate: 1e9,
                latency: 0.0,
                src_host: None,
                dst_host: None,
                detached: false,
                dst_actor_hint: None,
                match_data: None,
                match_fn: None,
                copy_fn: None,
                clean_fn: None,
                payload: None,
            },
        );
        let sleep_id = exec::new_sleep(inner, host, 10.0, actor);
        exec::sleep::start(inner, sleep_id, actor);
        (comm_id, sleep_id)
    });
    *ids.borrow_mut() = Some((comm_id, sleep_id));

    engine.run();

    assert!((engine.now() - 3.0).abs() < 1e-9, "now={}", engine.now());
    match result.borrow_mut().take() {
        Some(Err(ActorError::Kernel(KernelError::Timeout(_)))) => {}
        other => panic!("expected a Timeout error, got {other:?}"),
    }
    let wait_any_result = engine.with_inner_mut(|inner| inner.actors.get(actor).expect("actor still in arena").wait_any_result);
    assert_eq!(wait_any_result, Some(-1));
}
