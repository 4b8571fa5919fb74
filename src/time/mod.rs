//! Simulated time and the timer heap (spec §4.B).

mod timer_heap;

pub use timer_heap::TimerHeap;

/// Simulated time, in seconds, since the start of the run.
///
/// Distinct from wall-clock time: `chrono::DateTime<Utc>` is used elsewhere
/// in this crate only for timestamping monitoring/signal events, never for
/// the simulated clock itself (spec §5 determinism: two runs with the same
/// user code and resource model must produce bit-identical timelines, which
/// rules out sourcing this value from the OS clock).
pub type SimTime = f64;
