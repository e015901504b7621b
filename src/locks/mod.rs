//! The locking engine: method walks, liveness resolution, and the
//! reference-counted manager.
//!
//! Layering, bottom to top: `methods` applies one primitive at a time,
//! `orchestrator` walks the configured method list (and probes dotlock
//! holders for liveness), `manager` adds reference counting, epochs, and
//! downgrade on top. `context` is the mutable state threaded through one
//! transition.

mod context;
mod manager;
mod methods;
mod orchestrator;
mod types;


pub use manager::MailboxLock;
pub use types::{AcquireOutcome, LockId, LockMode};
