//! Typed message queue: a rendezvous channel without transfer simulation or
//! buffer-copy semantics (spec §3 "Message Queue", §4.E "Mess").

use std::any::Any;
use std::collections::VecDeque;

use crate::activity::{self, ActivityHeader, ActivityRecord, ActivityState};
use crate::engine::EngineInner;
use crate::util::{ActivityId, ActorId, MessageQueueId};

/// The message-queue kernel object: a FIFO of pending PUTs and GETs.
pub struct MessageQueue {
    pub pending_puts: VecDeque<ActivityId>,
    pub pending_gets: VecDeque<ActivityId>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            pending_puts: VecDeque::new(),
            pending_gets: VecDeque::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessDirection {
    Put,
    Get,
}

/// Concrete `Mess` activity body (spec §3 "Mess").
pub struct MessBody {
    pub header: ActivityHeader,
    pub direction: MessDirection,
    pub queue: MessageQueueId,
    pub payload: Option<Box<dyn Any>>,
    pub src_actor: Option<ActorId>,
    pub dst_actor: Option<ActorId>,
}

/// `iput(observer)` (spec §4.E): matches the oldest pending GET, else
/// enqueues. A matched pair transitions READY→STARTED→DONE in one step
/// (`start()` calling `finish()` directly — no resource modeling).
pub fn iput(engine: &mut EngineInner, queue_id: MessageQueueId, issuer: ActorId, payload: Box<dyn Any>) -> ActivityId {
    if let Some(getter_id) = engine.message_queues.get_mut(queue_id).expect("iput on unknown queue").pending_gets.pop_front() {
        if let Some(ActivityRecord::Mess(getter_body)) = engine.activities.get_mut(getter_id) {
            getter_body.payload = Some(payload);
            getter_body.src_actor = Some(issuer);
            getter_body.header.state = ActivityState::Done;
        }
        activity::finish(engine, getter_id);

        let mut header = ActivityHeader::new();
        header.owner = Some(issuer);
        header.start_time = Some(engine.now);
        header.finish_time = Some(engine.now);
        header.state = ActivityState::Done;
        let body = MessBody {
            header,
            direction: MessDirection::Put,
            queue: queue_id,
            payload: None,
            src_actor: Some(issuer),
            dst_actor: None,
        };
        let id = engine.activities.insert(ActivityRecord::Mess(body));
        engine.own_activity(issuer, id);
        return id;
    }

    let mut header = ActivityHeader::new();
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    header.state = ActivityState::Started;
    let body = MessBody {
        header,
        direction: MessDirection::Put,
        queue: queue_id,
        payload: Some(payload),
        src_actor: Some(issuer),
        dst_actor: None,
    };
    let id = engine.activities.insert(ActivityRecord::Mess(body));
    engine.message_queues.get_mut(queue_id).expect("checked above").pending_puts.push_back(id);
    engine.own_activity(issuer, id);
    id
}

/// `iget(observer)` (spec §4.E): symmetric to [`iput`].
pub fn iget(engine: &mut EngineInner, queue_id: MessageQueueId, issuer: ActorId) -> ActivityId {
    if let Some(putter_id) = engine.message_queues.get_mut(queue_id).expect("iget on unknown queue").pending_puts.pop_front() {
        let payload = match engine.activities.get_mut(putter_id) {
            Some(ActivityRecord::Mess(putter_body)) => {
                putter_body.header.state = ActivityState::Done;
                putter_body.dst_actor = Some(issuer);
                putter_body.payload.take()
            }
            _ => None,
        };
        activity::finish(engine, putter_id);

        let mut header = ActivityHeader::new();
        header.owner = Some(issuer);
        header.start_time = Some(engine.now);
        header.finish_time = Some(engine.now);
        header.state = ActivityState::Done;
        let body = MessBody {
            header,
            direction: MessDirection::Get,
            queue: queue_id,
            payload,
            src_actor: None,
            dst_actor: Some(issuer),
        };
        let id = engine.activities.insert(ActivityRecord::Mess(body));
        engine.own_activity(issuer, id);
        return id;
    }

    let mut header = ActivityHeader::new();
    header.owner = Some(issuer);
    header.start_time = Some(engine.now);
    header.state = ActivityState::Started;
    let body = MessBody {
        header,
        direction: MessDirection::Get,
        queue: queue_id,
        payload: None,
        src_actor: None,
        dst_actor: Some(issuer),
    };
    let id = engine.activities.insert(ActivityRecord::Mess(body));
    engine.message_queues.get_mut(queue_id).expect("checked above").pending_gets.push_back(id);
    engine.own_activity(issuer, id);
    id
}
