//! Where event streams come from.

mod http;
mod local;

use async_trait::async_trait;
use cinescout_core::{ChatRequest, StreamingEvent};
use futures_util::stream::BoxStream;

pub use http::HttpTransport;
pub use local::LocalTransport;

use crate::TransportError;

/// The events of one answer. The stream ends after a terminal event, or
/// early if the connection broke.
pub type EventStream =
    BoxStream<'static, Result<StreamingEvent, TransportError>>;

/// Opens event streams for chat requests.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `request` and returns the stream of its answer.
    async fn open(&self, request: ChatRequest)
    -> Result<EventStream, TransportError>;
}
