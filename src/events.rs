use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Opaque, globally unique identifier minted at `start_stream` time. The
/// sole correlator between a stream and the events it publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StreamId(Uuid);

impl StreamId {
    pub fn new() -> Self {
        StreamId(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The uniform event shape published on the `llm-stream` channel.
/// Exactly one of three terminal shapes ends each stream: a final
/// `done: true, error: None`, a final `done: true, error: Some(..)`, or
/// (on cancellation) no further event at all.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedEvent {
    pub stream_id: StreamId,
    pub delta: String,
    pub done: bool,
    pub error: Option<String>,
}

impl NormalizedEvent {
    pub fn delta(stream_id: StreamId, text: impl Into<String>) -> Self {
        NormalizedEvent { stream_id, delta: text.into(), done: false, error: None }
    }

    pub fn done(stream_id: StreamId) -> Self {
        NormalizedEvent { stream_id, delta: String::new(), done: true, error: None }
    }

    pub fn error(stream_id: StreamId, message: impl Into<String>) -> Self {
        NormalizedEvent { stream_id, delta: String::new(), done: true, error: Some(message.into()) }
    }
}

/// The single named publish channel (`llm-stream`). Single-producer
/// (the Dispatcher, via its sessions), multiple-consumer (the UI and
/// any other current subscribers). Does not persist messages: a
/// subscriber only receives events published after it subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<NormalizedEvent>,
}

/// Channel depth chosen so a session's full per-chunk delta burst can
/// be buffered without blocking on a briefly-busy UI thread; the UI is
/// the only consumer and is expected to be faster than the network.
const BUS_CAPACITY: usize = 1024;

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(BUS_CAPACITY);
        EventBus { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<NormalizedEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. A send with no current subscribers is not an
    /// error — the bus does not persist messages for late joiners.
    pub fn publish(&self, event: NormalizedEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_ids_are_pairwise_distinct() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(StreamId::new()));
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let id = StreamId::new();
        bus.publish(NormalizedEvent::delta(id, "a"));
        bus.publish(NormalizedEvent::delta(id, "b"));
        bus.publish(NormalizedEvent::done(id));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert_eq!(first.delta, "a");
        assert_eq!(second.delta, "b");
        assert!(third.done);
    }
}
