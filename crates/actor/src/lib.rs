//! A lightweight actor runtime.
//!
//! An actor owns its state and processes messages one at a time on a tokio
//! task. Besides plain messages it can schedule delayed messages (timers)
//! and spawn helper tasks, both tied to [`TaskHandle`]s that abort when
//! dropped, so state that goes away takes its timers with it.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod scheduler;
mod task;

pub use error::ActorDeadError;
pub use handle::Actor;
pub use mailbox::Message;
pub use task::TaskHandle;
