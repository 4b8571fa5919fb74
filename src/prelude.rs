//! Prelude module for convenient imports.
//!
//! This module re-exports the types most call sites need to set up an
//! [`Engine`](crate::engine::Engine), spawn actors, and drive them through
//! their simcalls. Import it to get started quickly:
//!
//! ```rust
//! use simkern::prelude::*;
//! ```
//!
//! # What's Included
//!
//! ## Scheduler core
//! - [`Engine`] - The kernel value and its maestro scheduler loop
//! - [`ActorContext`] - The handle an actor body uses to issue simcalls
//! - [`ActorError`] - What an actor body sees a failed simcall/kill as
//! - [`EngineConfig`] - Engine-wide configuration, built with a fluent builder
//!
//! ## Ids
//! - [`ActorId`], [`ActivityId`], [`HostId`], [`MailboxId`], [`MessageQueueId`],
//!   [`MutexId`], [`SemaphoreId`], [`BarrierId`], [`CondvarId`]
//!
//! ## Errors
//! - [`KernelError`] - The recoverable/reportable kernel error taxonomy
//! - [`ForcefulKill`] - The unwind condition raised when an actor is killed
//!
//! ## Synchronization
//! - [`Mutex`], [`Semaphore`], [`Barrier`], [`Condvar`] - The shared
//!   synchronization objects; acquired and released through
//!   [`ActorContext`]'s `lock`/`sem_acquire`/`barrier_wait`/`condvar_wait`
//!   methods rather than directly.
//!
//! ## Communication
//! - [`CommRequest`] - Parameters for a mailbox rendezvous send/receive
//! - [`CommDirection`] - SEND or RECEIVE
//! - [`MessageQueue`] - A named, ordered, typed channel
//!
//! ## Model-checker observer protocol
//! - [`SimcallObserver`], [`VisibleKind`], [`McChannel`]
//!
//! # Example
//!
//! ```rust
//! use simkern::prelude::*;
//!
//! let engine = Engine::new(EngineConfig::default());
//! let host = engine.new_host("h1");
//! engine.spawn("worker", host, |ctx: ActorContext| async move {
//!     ctx.sleep(1.0).await.ok();
//! });
//! engine.run();
//! assert_eq!(engine.now(), 1.0);
//! ```

// Scheduler core
pub use crate::actor::{ActorContext, ActorError};
pub use crate::config::EngineConfig;
pub use crate::engine::Engine;

// Errors
pub use crate::error::{ForcefulKill, KernelError};

// Activities
pub use crate::activity::ActivityState;

// Communication
pub use crate::comm::{CommDirection, CommRequest, MessageQueue};

// Synchronization
pub use crate::sync::{Barrier, Condvar, Mutex, Semaphore};

// Model-checker observer protocol
pub use crate::simcall::{McChannel, SimcallObserver, VisibleKind};

// Ids
pub use crate::util::{
    ActivityId, ActorId, BarrierId, CondvarId, HostId, MailboxId, MessageQueueId, MutexId,
    SemaphoreId,
};
