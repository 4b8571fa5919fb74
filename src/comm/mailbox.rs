//! Named rendezvous mailbox (spec §3 "Mailbox", §4.E).
//!
//! **[SUPPLEMENT, from `examples/original_source/src/kernel/activity/MailboxImpl.hpp`]**
//! mailboxes carry a monotonically increasing id independent of their name,
//! used for model-checker serialization ordering; exposed here as
//! [`crate::util::MailboxId`] even though the distilled spec only describes
//! the name-keyed registry.

use std::collections::VecDeque;

use crate::util::{ActivityId, ActorId};

/// The mailbox kernel object.
pub struct Mailbox {
    /// Pending comms awaiting a matching peer (spec §3 invariant: a comm is
    /// in exactly one mailbox queue or none).
    pub queue: VecDeque<ActivityId>,
    /// Completed comms parked here for "permanent receiver" mode.
    pub done_queue: VecDeque<ActivityId>,
    /// The actor (if any) that has claimed this mailbox (spec §4.E
    /// "Permanent-receiver mode").
    pub permanent_receiver: Option<ActorId>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            done_queue: VecDeque::new(),
            permanent_receiver: None,
        }
    }
}
