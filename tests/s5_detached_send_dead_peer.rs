//! Scenario S5 (spec §8): a detached send names its destination actor via
//! `dst_actor_hint` before any match occurs. When that actor dies first, the
//! send must fail with `LinkFailure`, run its clean callback exactly once,
//! and never be observed by the actor that issued it (a genuine fire-and-
//! forget — `ActorContext::send` always waits, so this issues the send
//! directly through `comm::isend`, the same escape hatch the crate's own
//! unit tests use).

use std::cell::RefCell;
use std::rc::Rc;

use simkern::activity::ActivityRecord;
use simkern::comm::{isend, CommRequest};
use simkern::prelude::*;

#[test]
fn detached_send_to_a_dead_peer_fails_and_cleans_up() {
    let engine = Engine::new_for_tests();
    let host = engine.new_host("host");

    let a = engine.spawn("a", host, |_ctx: ActorContext| async move {});
    let b = engine.spawn("b", host, |ctx: ActorContext| async move {
        ctx.sleep(1e9).await.ok();
    });

    let mailbox = engine.with_inner_mut(|inner| inner.mailboxes.insert(simkern::comm::Mailbox::new()));

    let cleaned: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));
    let cleaned_for_clean = cleaned.clone();

    let comm_id = engine.with_inner_mut(|inner| {
        isend(
            inner,
            a,
            CommRequest {
                mailbox,
                size: 1e6,
                rate: 1e9,
                latency: 0.0,
                src_host: None,
                dst_host: None,
                detached: true,
                dst_actor_hint: Some(b),
                match_data: None,
                match_fn: None,
                copy_fn: None,
                clean_fn: Some(Box::new(move |_payload| {
                    *cleaned_for_clean.borrow_mut() = true;
                })),
                payload: Some(Box::new(99u32)),
            },
        )
    });

    // B dies before anyone ever calls `irecv` on this mailbox, so the comm
    // never has a chance to match.
    engine.with_inner_mut(|inner| inner.kill_actor(b));

    engine.run();

    assert!(*cleaned.borrow(), "clean callback must run exactly once");
    let state = engine.with_inner_mut(|inner| match inner.activities.get(comm_id) {
        Some(ActivityRecord::Comm(body)) => body.header.state,
        _ => panic!("comm activity missing from the arena"),
    });
    assert_eq!(state, ActivityState::LinkFailure);
}
