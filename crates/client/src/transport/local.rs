use async_trait::async_trait;
use cinescout_core::{ChatRequest, Driver};
use futures_util::StreamExt;

use super::{ChatTransport, EventStream};
use crate::TransportError;

/// Runs a [`Driver`] in this process.
///
/// Needs a tokio runtime, the driver works on a spawned task.
#[derive(Clone)]
pub struct LocalTransport {
    driver: Driver,
}

impl LocalTransport {
    /// Creates a transport answering with `driver`.
    #[inline]
    pub fn new(driver: Driver) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl ChatTransport for LocalTransport {
    async fn open(
        &self,
        request: ChatRequest,
    ) -> Result<EventStream, TransportError> {
        Ok(self.driver.stream(request).map(Ok).boxed())
    }
}
