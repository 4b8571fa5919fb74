//! Synchronization activities: mutex, semaphore, barrier, condition variable
//! (spec §4.D).

pub mod barrier;
pub mod condvar;
pub mod mutex;
pub mod semaphore;

pub use barrier::{Barrier, BarrierAcqBody};
pub use condvar::{Condvar, CondvarAcqBody};
pub use mutex::{Mutex, MutexAcqBody};
pub use semaphore::{SemAcqBody, Semaphore};
