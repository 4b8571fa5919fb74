//! Communication activities: mailbox rendezvous (`Comm`) and typed message
//! queues (`Mess`) (spec §4.E).

pub mod comm;
pub mod mailbox;
pub mod mess;

pub use comm::{fail_sends_hinted_at, finish_comm, irecv, isend, start, CommBody, CommDirection, CommRequest};
pub use mailbox::Mailbox;
pub use mess::{iget, iput, MessBody, MessDirection, MessageQueue};
