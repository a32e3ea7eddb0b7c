use std::collections::VecDeque;

use async_trait::async_trait;
use cinescout_core::wire::FrameDecoder;
use cinescout_core::{ChatRequest, StreamingEvent};
use futures_util::{StreamExt, stream};
use reqwest::Response;

use super::{ChatTransport, EventStream};
use crate::TransportError;

/// Streams answers from a server's `POST /api/chat` endpoint.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport for the server at `base_url`, e.g.
    /// `http://127.0.0.1:3000`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Like [`HttpTransport::new`], with a preconfigured client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(
        &self,
        request: ChatRequest,
    ) -> Result<EventStream, TransportError> {
        trace!("posting to {}", self.endpoint);
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            error!("chat request failed with status {status}");
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(decode_events(resp).boxed())
    }
}

struct DecodeState {
    resp: Response,
    decoder: FrameDecoder,
    pending: VecDeque<StreamingEvent>,
    finished: bool,
}

fn decode_events(
    resp: Response,
) -> impl futures_util::Stream<Item = Result<StreamingEvent, TransportError>>
+ Send
+ 'static {
    let state = DecodeState {
        resp,
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }
            match state.resp.chunk().await {
                Ok(Some(chunk)) => {
                    state.pending.extend(state.decoder.push(&chunk));
                }
                Ok(None) => {
                    state.finished = true;
                    state.pending.extend(state.decoder.finish());
                }
                Err(err) => {
                    warn!("event stream broke: {err}");
                    state.finished = true;
                    return Some((
                        Err(TransportError::Connection(err.to_string())),
                        state,
                    ));
                }
            }
        }
    })
}
