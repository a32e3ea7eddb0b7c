//! An abstraction layer for the reasoning model.
//!
//! This crate establishes a unified protocol for the conversation driver to
//! interact with a remote reasoning model: a request carries the whole
//! transcript, the tool catalog and optionally a schema the final output
//! must follow; a response is a pull-based sequence of events that ends
//! with the status the model reported.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
