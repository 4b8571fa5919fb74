//! Shared utilities: the generational arena and the typed ids built on it.

pub mod arena;
pub mod ids;
pub mod serde_helpers;

pub use arena::{Arena, Id};
pub use ids::{
    ActivityId, ActorId, BarrierId, CondvarId, HostId, MailboxId, MessageQueueId, MutexId,
    SemaphoreId, TimerId,
};
pub use serde_helpers::duration_serde;
