//! Scenario S1 (spec §8): two actors rendezvous over a mailbox with a 1ms
//! link latency and a 1MB payload at 1GB/s. Both halves must observe
//! completion, and the receiver must see the payload the sender handed it.

use std::cell::RefCell;
use std::rc::Rc;

use simkern::prelude::*;

#[test]
fn matched_pair_completes_at_latency_plus_transfer_time() {
    let engine = Engine::new_for_tests();
    let host_a = engine.new_host("host-a");
    let host_b = engine.new_host("host-b");

    let mailbox = engine.with_inner_mut(|inner| inner.mailboxes.insert(simkern::comm::Mailbox::new()));

    let received: Rc<RefCell<Option<u32>>> = Rc::new(RefCell::new(None));
    let received_for_b = received.clone();

    engine.spawn("sender", host_a, move |ctx: ActorContext| async move {
        ctx.send(CommRequest {
            mailbox,
            size: 1e6,
            rate: 1e9,
            latency: 1e-3,
            src_host: Some(host_a),
            dst_host: Some(host_b),
            detached: false,
            dst_actor_hint: None,
            match_data: None,
            match_fn: None,
            copy_fn: None,
            clean_fn: None,
            payload: Some(Box::new(42u32)),
        })
        .await
        .expect("send completes");
    });

    engine.spawn("receiver", host_b, move |ctx: ActorContext| async move {
        let payload = ctx
            .recv(CommRequest {
                mailbox,
                size: 1e6,
                rate: 1e9,
                latency: 1e-3,
                src_host: Some(host_a),
                dst_host: Some(host_b),
                detached: false,
                dst_actor_hint: None,
                match_data: None,
                match_fn: None,
                copy_fn: None,
                clean_fn: None,
                payload: None,
            })
            .await
            .expect("recv completes");
        let value = *payload.downcast::<u32>().expect("payload is a u32");
        *received_for_b.borrow_mut() = Some(value);
    });

    engine.run();

    assert!((engine.now() - 2e-3).abs() < 1e-9, "now={}", engine.now());
    assert_eq!(*received.borrow(), Some(42));
}
