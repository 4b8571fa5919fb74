//! Host-bound activities: CPU execution, disk I/O, and sleeps (spec §4.F).

pub mod exec;
pub mod io;
pub mod sleep;

pub use exec::{finish_exec, migrate, new_exec, new_parallel_exec, ExecBody};
pub use io::{finish_io, new_io, IoBody, IoOpKind};
pub use sleep::{finish_sleep, new_sleep, SleepBody};
