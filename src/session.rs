use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::adapters::{Adapter, ParsedEvent};
use crate::config::{PromptPair, ProviderRecord};
use crate::events::{EventBus, NormalizedEvent, StreamId};

/// How much of an error response body to read and surface in a
/// `ProviderError` event. Upstream error bodies are small JSON objects;
/// bounding this avoids buffering an unbounded body on a misbehaving
/// endpoint.
const ERROR_BODY_EXCERPT_LIMIT: usize = 4096;

/// `Starting -> Connecting -> Streaming -> Terminal`. `Terminal` is
/// absorbing: once reached (including via cancellation) the session
/// publishes nothing further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
enum SessionState {
    Starting,
    Connecting,
    Streaming,
    Terminal,
}

/// Drives one stream to completion: builds the request, reads the
/// response body incrementally, feeds bytes through the adapter, and
/// publishes normalized events. Spawned as an independent task per
/// `start_stream` call; owns the cancellation token and the HTTP
/// response body for the session's whole lifetime.
pub struct StreamSession {
    pub stream_id: StreamId,
    client: reqwest::Client,
    record: ProviderRecord,
    prompts: PromptPair,
    adapter: Box<dyn Adapter>,
    bus: EventBus,
    cancel: CancellationToken,
}

impl StreamSession {
    pub fn new(
        stream_id: StreamId,
        client: reqwest::Client,
        record: ProviderRecord,
        prompts: PromptPair,
        adapter: Box<dyn Adapter>,
        bus: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        StreamSession { stream_id, client, record, prompts, adapter, bus, cancel }
    }

    /// Runs the driver loop to completion. Never panics on upstream
    /// malformed input or network failure — every exit path publishes
    /// at most one terminal event, or none at all on cancellation.
    pub async fn run(mut self) {
        tracing::debug!(stream_id = %self.stream_id, state = ?SessionState::Connecting, "starting stream");

        let request = self.adapter.build_request(&self.client, &self.record, &self.prompts);

        let response = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::debug!(stream_id = %self.stream_id, "cancelled before connect");
                return;
            }
            result = request.send() => result,
        };

        let response = match response {
            Ok(resp) => resp,
            Err(e) => {
                self.publish_terminal_error(format!("network error: {e}"));
                return;
            }
        };

        if response.status().as_u16() >= 400 {
            let status = response.status().as_u16();
            let excerpt = read_bounded_excerpt(response, ERROR_BODY_EXCERPT_LIMIT).await;
            self.publish_terminal_error(format!("provider returned HTTP {status}: {excerpt}"));
            return;
        }

        tracing::debug!(stream_id = %self.stream_id, state = ?SessionState::Streaming, "response headers received");
        let mut byte_stream = response.bytes_stream();

        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(stream_id = %self.stream_id, "cancelled mid-stream");
                    return;
                }
                next = byte_stream.next() => next,
            };

            let Some(chunk) = chunk else {
                // body closed
                match self.adapter.on_body_end() {
                    Ok(Some(ParsedEvent::Done)) => self.publish_terminal_done(),
                    Ok(Some(ParsedEvent::Error(detail))) => self.publish_terminal_error(detail),
                    Ok(Some(ParsedEvent::Delta(_))) | Ok(None) => {}
                    Err(e) => self.publish_terminal_error(e.to_string()),
                }
                break;
            };

            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.publish_terminal_error(format!("network error: {e}"));
                    return;
                }
            };

            let events = match self.adapter.feed(&bytes) {
                Ok(events) => events,
                Err(e) => {
                    self.publish_terminal_error(e.to_string());
                    return;
                }
            };

            let mut terminated = false;
            for event in events {
                match event {
                    ParsedEvent::Delta(text) => {
                        self.bus.publish(NormalizedEvent::delta(self.stream_id, text));
                    }
                    ParsedEvent::Done => {
                        self.publish_terminal_done();
                        terminated = true;
                    }
                    ParsedEvent::Error(detail) => {
                        self.publish_terminal_error(detail);
                        terminated = true;
                    }
                }
                if terminated {
                    break;
                }
            }
            if terminated {
                return;
            }
        }

        tracing::debug!(stream_id = %self.stream_id, state = ?SessionState::Terminal, "stream finished");
    }

    fn publish_terminal_done(&self) {
        self.bus.publish(NormalizedEvent::done(self.stream_id));
    }

    fn publish_terminal_error(&self, message: String) {
        self.bus.publish(NormalizedEvent::error(self.stream_id, message));
    }
}

async fn read_bounded_excerpt(response: reqwest::Response, limit: usize) -> String {
    match response.bytes().await {
        Ok(bytes) => {
            let slice = if bytes.len() > limit { &bytes[..limit] } else { &bytes[..] };
            String::from_utf8_lossy(slice).into_owned()
        }
        Err(e) => format!("<failed to read error body: {e}>"),
    }
}
