//! Core logic: the conversation driver, tool dispatch and the event
//! protocol between the driver and its clients.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod driver;
pub mod event;
pub mod message;
mod model_client;
pub mod tool;
pub mod wire;

pub use driver::{
    Answer, DEFAULT_INSTRUCTIONS, Driver, DriverBuilder, DriverError,
    FinalAnswer, ToolPhaseOutcome,
};
pub use event::{EventStream, StreamingEvent, ToolCallStatus};
pub use message::{ChatMessage, ChatRequest, ChatRole, Locale, MAX_MESSAGES};
pub use model_client::ModelError;
