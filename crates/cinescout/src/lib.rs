//! CineScout: a movie and TV recommendation assistant.
//!
//! The crate wires the driver to OpenAI and TMDB, serves it over HTTP and
//! ships a CLI that chats with a running server or with an in-process
//! driver.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod server;

pub use config::{CatalogKind, ConfigError, Settings};

/// Re-exports of [`cinescout_core`] crate.
pub mod core {
    pub use cinescout_core::*;
}

/// Re-exports of [`cinescout_client`] crate.
pub mod client {
    pub use cinescout_client::*;
}
