//! # simkern — a deterministic, single-threaded cooperative simulation kernel
//!
//! `simkern` drives user-written concurrent **actors** through simulated
//! time, coordinating their **activities** (communications, executions, I/O,
//! synchronization primitives) and advancing a virtual clock by consulting
//! an external [`resource`] model. It is the kernel of a distributed-
//! application simulator: platform topology, routing, tracing backends,
//! language bindings, and the model-checker's own exploration algorithm are
//! all external collaborators this crate does not implement — only the
//! contracts they consume are in scope.
//!
//! # Quick Start
//!
//! ```rust
//! use simkern::config::EngineConfig;
//! use simkern::engine::Engine;
//!
//! let engine = Engine::new(EngineConfig::default());
//! let host_a = engine.new_host("a");
//! let host_b = engine.new_host("b");
//!
//! engine.spawn("sender", host_a, |ctx| async move {
//!     ctx.sleep(1.0).await.ok();
//! });
//! engine.spawn("receiver", host_b, |ctx| async move {
//!     ctx.sleep(2.0).await.ok();
//! });
//!
//! engine.run();
//! assert_eq!(engine.now(), 2.0);
//! ```
//!
//! # Core Concepts
//!
//! - **Actor**: a simulated concurrent entity executing user code as an
//!   `async fn`, mapped one-to-one onto a cooperative [`context::Suspend`]
//!   point. See [`actor`].
//! - **Activity**: anything an actor can wait on — a rendezvous comm, a typed
//!   message, a CPU/disk/sleep action, or a synchronization acquisition. See
//!   [`activity`].
//! - **Simcall**: the one kind of request that must execute in kernel mode;
//!   the only suspension point user code reaches. See [`simcall`].
//! - **Engine**: the kernel value and its maestro scheduler loop — drains
//!   runnable actors, dispatches their simcalls, and advances simulated time
//!   by consulting the [`resource`] model. See [`engine`].
//!
//! # Module Organization
//!
//! ## Scheduler core
//! - [`context`] - Cooperative switching between maestro and each actor
//! - [`engine`] - The kernel value, the maestro loop, signals
//! - [`simcall`] - Kernel-mode requests and the model-checker observer protocol
//! - [`actor`] - The actor object and the handle user code runs inside of
//!
//! ## Activities
//! - [`activity`] - The shared activity lifecycle (wait/test/cancel/finish)
//! - [`sync`] - Mutex, semaphore, barrier, condition variable
//! - [`comm`] - Mailbox rendezvous (`Comm`) and typed message queues (`Mess`)
//! - [`exec`] - CPU execution, disk I/O, and sleep activities
//!
//! ## Infrastructure
//! - [`resource`] - The external resource model contract plus a reference model
//! - [`time`] - Simulated time and the timer heap
//! - [`config`] - Engine-wide configuration
//! - [`error`] - The kernel error taxonomy
//! - [`util`] - The generational arena and the typed ids built on it
//!
//! # Determinism
//!
//! Given the same sequence of user code and the same resource model, two
//! runs of a [`engine::Engine`] produce bit-identical simulated timelines and
//! identical actor scheduling sequences: ids are monotonic and never reused
//! within a run, and every ordering-sensitive structure (the timer heap,
//! mailbox matching, the runnable queue) breaks ties by insertion order, not
//! by anything sourced from the host OS.
//!
//! # See Also
//!
//! - `SPEC_FULL.md` in the crate root for the full kernel specification this
//!   crate implements.
//! - `DESIGN.md` for the grounding ledger and the Open Question decisions
//!   made while building it.

pub mod activity;
pub mod actor;
pub mod comm;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod exec;
pub mod prelude;
pub mod resource;
pub mod simcall;
pub mod sync;
pub mod time;
pub mod util;

// Re-export the handful of types needed to set up and drive a simulation
// without reaching into submodules.
pub use actor::{ActorContext, ActorError};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::KernelError;
pub use util::{ActivityId, ActorId, HostId, MailboxId, MessageQueueId};
