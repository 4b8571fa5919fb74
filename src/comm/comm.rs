//! Mailbox-based rendezvous communication (spec §4.E "Comm").
//!
//! The hard part of the kernel: matching, copy semantics, detached sends,
//! permanent receivers, and the SRC/DST failure ordering in `finish()`.

use std::any::Any;
use std::rc::Rc;

use crate::activity::{self, ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::resource::{Action, ActionState, LinearAction, ResourceModel};
use crate::util::{ActivityId, ActorId, HostId, MailboxId};

/// Direction of a [`CommBody`] (spec §3 "Comm").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommDirection {
    Send,
    Recv,
}

/// A match predicate: `(query_match_data, candidate_match_data, candidate) ->
/// bool` (spec §4.E "Mailbox matching predicate"). The third argument is the
/// candidate `CommBody` itself, so a predicate that needs more than the two
/// match-data pointers — the candidate's size, mailbox, or direction — has
/// somewhere to get it, mirroring the three-argument `match_fun` the
/// original mailbox implementation passes its own comm object into.
pub type MatchPredicate = Rc<dyn Fn(Option<&dyn Any>, Option<&dyn Any>, &CommBody) -> bool>;

/// A copy-data transform: consumes the source payload, returns what the
/// destination observes (spec §4.E `copy_data()`). Identity if absent.
pub type CopyFn = Box<dyn FnOnce(Box<dyn Any>) -> Box<dyn Any>>;

/// A clean callback run on a detached send's failure path (spec §4.E,
/// invariant 9 in §8): frees the source buffer exactly once.
pub type CleanFn = Box<dyn FnOnce(Box<dyn Any>)>;

/// Concrete `Comm` activity body (spec §3).
pub struct CommBody {
    pub header: ActivityHeader,
    pub direction: CommDirection,
    pub mailbox: MailboxId,
    pub size: f64,
    pub rate: f64,
    pub latency: f64,
    pub src_host: Option<HostId>,
    pub dst_host: Option<HostId>,
    pub detached: bool,
    pub copy_done: bool,
    pub match_data: Option<Box<dyn Any>>,
    pub match_fn: Option<MatchPredicate>,
    pub copy_fn: Option<CopyFn>,
    pub clean_fn: Option<CleanFn>,
    pub src_actor: Option<ActorId>,
    pub dst_actor: Option<ActorId>,
    /// Actor hint used purely to propagate failure to a not-yet-matched
    /// detached send whose logical destination is already known (a
    /// pragmatic extension beyond the name-keyed matching the distilled
    /// spec describes, needed to fail sends cleanly when their intended
    /// peer dies before rendezvous — see DESIGN.md).
    pub dst_actor_hint: Option<ActorId>,
    pub payload: Option<Box<dyn Any>>,
    pub action: Option<LinearAction>,
    pub comm_id: u64,
    /// The other half of this rendezvous once matched (spec §4.E "become the
    /// matched pair"): only the activity `start()` attached an action to
    /// drives the transfer to completion, so `finish_comm` mirrors its
    /// terminal state onto this id so both sides' waiters observe it.
    pub partner: Option<ActivityId>,
}

impl CommBody {
    fn matches(query: &CommBody, candidate: &CommBody) -> bool {
        if query.direction == candidate.direction {
            return false;
        }
        if let Some(f) = &query.match_fn {
            if !f(query.match_data.as_deref(), candidate.match_data.as_deref(), candidate) {
                return false;
            }
        }
        if let Some(f) = &candidate.match_fn {
            if !f(candidate.match_data.as_deref(), query.match_data.as_deref(), query) {
                return false;
            }
        }
        true
    }
}

/// Parameters for starting a new comm, filled in by the user-facing layer
/// before `isend`/`irecv` is invoked.
pub struct CommRequest {
    pub mailbox: MailboxId,
    pub size: f64,
    pub rate: f64,
    /// Fixed network latency (seconds) before bandwidth-limited transfer
    /// begins (spec §8 scenario S1). Zero for a same-host or no-latency link.
    pub latency: f64,
    pub src_host: Option<HostId>,
    pub dst_host: Option<HostId>,
    pub detached: bool,
    pub dst_actor_hint: Option<ActorId>,
    pub match_data: Option<Box<dyn Any>>,
    pub match_fn: Option<MatchPredicate>,
    pub copy_fn: Option<CopyFn>,
    pub clean_fn: Option<CleanFn>,
    pub payload: Option<Box<dyn Any>>,
}

fn new_body(req: CommRequest, direction: CommDirection, comm_id: u64, owner: ActorId, now: crate::time::SimTime) -> CommBody {
    let mut header = ActivityHeader::new();
    header.owner = Some(owner);
    header.start_time = Some(now);
    CommBody {
        header,
        direction,
        mailbox: req.mailbox,
        size: req.size,
        rate: req.rate,
        latency: req.latency,
        src_host: req.src_host,
        dst_host: req.dst_host,
        detached: req.detached,
        copy_done: false,
        match_data: req.match_data,
        match_fn: req.match_fn,
        copy_fn: req.copy_fn,
        clean_fn: req.clean_fn,
        src_actor: None,
        dst_actor: None,
        dst_actor_hint: req.dst_actor_hint,
        payload: req.payload,
        action: None,
        comm_id,
        partner: None,
    }
}

/// `isend(observer) → activity` (spec §4.E).
pub fn isend(engine: &mut EngineInner, issuer: ActorId, req: CommRequest) -> ActivityId {
    let mailbox_id = req.mailbox;
    let comm_id = engine.next_comm_id();
    let mut body = new_body(req, CommDirection::Send, comm_id, issuer, engine.now);
    body.src_actor = Some(issuer);

    let id = match find_match(engine, mailbox_id, &body) {
        Some(peer_id) => {
            remove_from_mailbox(engine, mailbox_id, peer_id);
            let id = engine.activities.insert(ActivityRecord::Comm(body));
            bind_peers(engine, id, peer_id);
            set_ready(engine, id);
            id
        }
        None => {
            let id = engine.activities.insert(ActivityRecord::Comm(body));
            engine.mailboxes.get_mut(mailbox_id).expect("isend on unknown mailbox").queue.push_back(id);
            engine.activities.get_mut(id).expect("just inserted").header_mut().state = ActivityState::Waiting;
            id
        }
    };
    engine.own_activity(issuer, id);

    if !engine.model_checker_active() {
        start(engine, id);
    }
    id
}

/// `irecv(observer) → activity` (spec §4.E).
pub fn irecv(engine: &mut EngineInner, issuer: ActorId, req: CommRequest) -> ActivityId {
    let mailbox_id = req.mailbox;

    if let Some(done_id) = pop_permanent_receiver_match(engine, mailbox_id) {
        if let Some(ActivityRecord::Comm(body)) = engine.activities.get_mut(done_id) {
            body.dst_actor = Some(issuer);
        }
        engine.own_activity(issuer, done_id);
        return done_id;
    }

    let comm_id = engine.next_comm_id();
    let mut body = new_body(req, CommDirection::Recv, comm_id, issuer, engine.now);
    body.dst_actor = Some(issuer);

    let id = match find_match(engine, mailbox_id, &body) {
        Some(peer_id) => {
            remove_from_mailbox(engine, mailbox_id, peer_id);
            let id = engine.activities.insert(ActivityRecord::Comm(body));
            bind_peers(engine, id, peer_id);
            set_ready(engine, id);
            id
        }
        None => {
            let id = engine.activities.insert(ActivityRecord::Comm(body));
            engine.mailboxes.get_mut(mailbox_id).expect("irecv on unknown mailbox").queue.push_back(id);
            engine.activities.get_mut(id).expect("just inserted").header_mut().state = ActivityState::Waiting;
            id
        }
    };
    engine.own_activity(issuer, id);

    if !engine.model_checker_active() {
        start(engine, id);
    }
    id
}

fn find_match(engine: &EngineInner, mailbox_id: MailboxId, query: &CommBody) -> Option<ActivityId> {
    let mailbox = engine.mailboxes.get(mailbox_id)?;
    mailbox.queue.iter().copied().find(|&candidate_id| {
        matches!(
            engine.activities.get(candidate_id),
            Some(ActivityRecord::Comm(candidate)) if CommBody::matches(query, candidate)
        )
    })
}

fn pop_permanent_receiver_match(engine: &mut EngineInner, mailbox_id: MailboxId) -> Option<ActivityId> {
    engine.mailboxes.get_mut(mailbox_id)?.done_queue.pop_front()
}

fn remove_from_mailbox(engine: &mut EngineInner, mailbox_id: MailboxId, id: ActivityId) {
    if let Some(mailbox) = engine.mailboxes.get_mut(mailbox_id) {
        mailbox.queue.retain(|&queued| queued != id);
    }
}

/// Bind `new_id`'s src/dst actor to its matched peer `peer_id` (spec §4.E
/// "become the matched pair"). Only `new_id` goes on to `start()` a resource
/// action and drive the transfer — `peer_id` is the activity the other side
/// is itself `wait_for`-ing on, so it is linked via `partner` and mirrored to
/// the same terminal state once `new_id` finishes (see [`finish_comm`]).
///
/// The payload (and its `copy_fn`, if any) always travels from whichever
/// side is the sender to whichever side is the receiver, independent of
/// which one happens to be `new_id` vs. `peer_id` — `copy_data()` and the
/// public `recv()`/`mess_get`-style retrieval both read off the receiving
/// side's own body.
fn bind_peers(engine: &mut EngineInner, new_id: ActivityId, peer_id: ActivityId) {
    let (peer_direction, peer_src, peer_dst) = match engine.activities.get(peer_id) {
        Some(ActivityRecord::Comm(b)) => (b.direction, b.src_actor, b.dst_actor),
        _ => unreachable!("mailbox queue referenced a non-comm activity"),
    };
    let new_direction = match engine.activities.get(new_id) {
        Some(ActivityRecord::Comm(b)) => b.direction,
        _ => unreachable!("bind_peers on an unknown activity"),
    };

    if let Some(ActivityRecord::Comm(new_body)) = engine.activities.get_mut(new_id) {
        match peer_direction {
            CommDirection::Send => new_body.src_actor = peer_src,
            CommDirection::Recv => new_body.dst_actor = peer_dst,
        }
        new_body.partner = Some(peer_id);
    }
    if let Some(ActivityRecord::Comm(peer_body)) = engine.activities.get_mut(peer_id) {
        peer_body.partner = Some(new_id);
        // Superseded going forward: `new_id` carries the action and drives
        // completion, but this id's own waiters still need notifying, so it
        // stays live (not terminal) until `finish_comm` mirrors it.
        peer_body.header.state = ActivityState::Ready;
    }

    let (send_id, recv_id) = if new_direction == CommDirection::Send { (new_id, peer_id) } else { (peer_id, new_id) };
    let (payload, copy_fn) = match engine.activities.get_mut(send_id) {
        Some(ActivityRecord::Comm(b)) => (b.payload.take(), b.copy_fn.take()),
        _ => (None, None),
    };
    if let Some(ActivityRecord::Comm(recv_body)) = engine.activities.get_mut(recv_id) {
        if payload.is_some() {
            recv_body.payload = payload;
        }
        if copy_fn.is_some() {
            recv_body.copy_fn = copy_fn;
        }
    }
}

fn set_ready(engine: &mut EngineInner, id: ActivityId) {
    if let Some(activity) = engine.activities.get_mut(id) {
        activity.header_mut().state = ActivityState::Ready;
    }
}

/// `start()` (spec §4.E): require READY, resolve hosts, obtain a network
/// action, transition to STARTED.
pub fn start(engine: &mut EngineInner, id: ActivityId) {
    let (size, rate, latency) = match engine.activities.get(id) {
        Some(ActivityRecord::Comm(b)) if b.header.state == ActivityState::Ready => (b.size, b.rate, b.latency),
        _ => return,
    };

    let action = engine.resource_model.network_action(size, rate.max(f64::MIN_POSITIVE), latency, engine.now);
    let already_failed = action.state() == ActionState::Failed;

    if let Some(ActivityRecord::Comm(body)) = engine.activities.get_mut(id) {
        body.header.state = ActivityState::Started;
        let mut action = action;
        action.set_activity(id);
        body.action = Some(action);
    }

    if already_failed {
        if let Some(ActivityRecord::Comm(body)) = engine.activities.get_mut(id) {
            body.header.state = ActivityState::LinkFailure;
        }
        finish_comm(engine, id);
    }
}

/// `copy_data()` (spec §4.E): idempotent, runs the user copy callback once.
pub fn copy_data(engine: &mut EngineInner, id: ActivityId) {
    let Some(ActivityRecord::Comm(body)) = engine.activities.get_mut(id) else {
        return;
    };
    if body.copy_done {
        return;
    }
    body.copy_done = true;
    let Some(payload) = body.payload.take() else {
        return;
    };
    let copied = match body.copy_fn.take() {
        Some(f) => f(payload),
        None => payload,
    };
    body.payload = Some(copied);
}

/// `finish()` (spec §4.E): decide the terminal state in SRC > DST > LINK >
/// DONE order, release the action, detach from the mailbox, copy data on
/// success, then run the shared waiter-notification tail.
pub fn finish_comm(engine: &mut EngineInner, id: ActivityId) {
    let (src_host_down, dst_host_down, partner) = {
        let body = match engine.activities.get(id) {
            Some(ActivityRecord::Comm(b)) => b,
            _ => return,
        };
        (
            body.src_host.map(|h| !engine.host_is_up(h)).unwrap_or(false),
            body.dst_host.map(|h| !engine.host_is_up(h)).unwrap_or(false),
            body.partner,
        )
    };

    let current_state = engine.activities.get(id).expect("checked above").state();
    let final_state = if src_host_down {
        ActivityState::SrcHostFailure
    } else if dst_host_down {
        ActivityState::DstHostFailure
    } else if current_state == ActivityState::LinkFailure {
        ActivityState::LinkFailure
    } else if current_state == ActivityState::Started || current_state == ActivityState::Ready {
        ActivityState::Done
    } else {
        current_state
    };

    if let Some(ActivityRecord::Comm(body)) = engine.activities.get_mut(id) {
        body.header.state = final_state;
        if let Some(mut action) = body.action.take() {
            action.cancel();
        }
    }

    let mailbox_id = engine_mailbox_of(engine, id);
    remove_from_mailbox(engine, mailbox_id, id);

    if final_state == ActivityState::Done {
        copy_data(engine, id);
    } else {
        run_clean_callback(engine, id);
    }

    activity::finish(engine, id);

    if let Some(partner_id) = partner {
        finish_partner(engine, partner_id, final_state);
    }
}

/// Mirror `finish_comm`'s terminal state onto the non-driving half of a
/// matched rendezvous (spec §4.E "become the matched pair"): `partner_id`
/// never got its own resource action, so it is finished here rather than
/// through the usual `start()` → completed-actions path.
fn finish_partner(engine: &mut EngineInner, partner_id: ActivityId, final_state: ActivityState) {
    let already_terminal = engine
        .activities
        .get(partner_id)
        .map(|a| a.header().state.is_terminal())
        .unwrap_or(true);
    if already_terminal {
        return;
    }

    if let Some(ActivityRecord::Comm(body)) = engine.activities.get_mut(partner_id) {
        body.header.state = final_state;
        body.partner = None;
    }

    let mailbox_id = engine_mailbox_of(engine, partner_id);
    remove_from_mailbox(engine, mailbox_id, partner_id);

    if final_state == ActivityState::Done {
        copy_data(engine, partner_id);
    } else {
        run_clean_callback(engine, partner_id);
    }

    activity::finish(engine, partner_id);
}

fn engine_mailbox_of(engine: &EngineInner, id: ActivityId) -> MailboxId {
    match engine.activities.get(id) {
        Some(ActivityRecord::Comm(b)) => b.mailbox,
        _ => unreachable!("engine_mailbox_of called on a non-comm activity"),
    }
}

fn run_clean_callback(engine: &mut EngineInner, id: ActivityId) {
    if let Some(ActivityRecord::Comm(body)) = engine.activities.get_mut(id) {
        if let (Some(clean), Some(payload)) = (body.clean_fn.take(), body.payload.take()) {
            clean(payload);
        }
    }
}

/// Called when an actor is killed: fail any mailbox-queued detached send
/// whose `dst_actor_hint` named the dead actor (spec §8 S5).
pub fn fail_sends_hinted_at(engine: &mut EngineInner, dead_actor: ActorId) {
    let ids: Vec<ActivityId> = engine
        .activities
        .iter()
        .filter_map(|(id, a)| match a {
            ActivityRecord::Comm(b)
                if b.dst_actor_hint == Some(dead_actor) && !b.header.state.is_terminal() =>
            {
                Some(id)
            }
            _ => None,
        })
        .collect();

    for id in ids {
        if let Some(ActivityRecord::Comm(body)) = engine.activities.get_mut(id) {
            body.header.state = ActivityState::LinkFailure;
        }
        finish_comm(engine, id);
    }
}
