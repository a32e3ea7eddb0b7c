//! The client side of a conversation.
//!
//! A [`ChatSession`] turns the event stream of each answer into an ordered,
//! observable list of [`Message`]s. The stream itself comes from a
//! [`ChatTransport`], either a server over HTTP or a driver running in the
//! same process.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod message;
mod session;
pub mod transport;

pub use error::{ClientError, TransportError};
pub use message::{ConversationState, Message, MessageStatus};
pub use session::{
    ChatSession, DEBOUNCE_INTERVAL, MAX_INPUT_CHARS, STALL_TIMEOUT,
};
pub use transport::{ChatTransport, HttpTransport, LocalTransport};
