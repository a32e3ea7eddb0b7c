//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use cinescout_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent, ModelResponseStatus,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if this.events.is_empty() {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to each request. Responses are consumed in the
/// order they were added, one per request. If the script runs out, an error
/// is returned. Every request received is recorded and can be inspected
/// with [`TestModelProvider::requests`].
///
/// Clones share the same script, so a test can keep a clone around to
/// inspect what the code under test sent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Appends a response to the script.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().responses.push_back(preset);
    }

    /// Sets the delay before each event is delivered.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let result = match script.responses.pop_front() {
            None => Err(Error {
                message: "no enough responses",
                kind: ErrorKind::Other,
            }),
            Some(PresetResponse {
                failure: Some(kind),
                ..
            }) => Err(Error {
                message: "preset failure",
                kind,
            }),
            Some(preset) => Ok(TestModelResponse {
                events: make_events(preset.events, preset.status),
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            }),
        };
        ready(result)
    }
}

fn make_events(
    preset_events: Vec<PresetEvent>,
    status: ModelResponseStatus,
) -> VecDeque<ModelResponseEvent> {
    preset_events
        .into_iter()
        .map(|event| match event {
            PresetEvent::Reasoning(delta) => {
                ModelResponseEvent::ReasoningDelta(delta)
            }
            PresetEvent::MessageDelta(delta) => {
                ModelResponseEvent::MessageDelta(delta)
            }
            PresetEvent::ToolCall(req) => ModelResponseEvent::ToolCall(req),
        })
        .chain([ModelResponseEvent::Finished(status)])
        .collect()
}
