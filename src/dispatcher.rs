use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::adapters::for_kind;
use crate::config::{AppConfig, ConfigStore, PromptPair, ProviderRecord};
use crate::error::{GatewayError, Result};
use crate::events::{EventBus, NormalizedEvent, StreamId};
use crate::session::StreamSession;

/// Bounded timeout on the HTTP connect phase. There is deliberately no
/// overall wall-clock timeout on streaming bodies: long-lived
/// generations are expected.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The prompt `test_connection` sends to probe a provider without
/// asking the caller to supply one.
const PROBE_PROMPT: &str = "ping";

/// Process-wide façade over the session table, the Event Bus, and the
/// configuration store. Exposes exactly the operations the UI calls.
pub struct Dispatcher {
    client: reqwest::Client,
    store: ConfigStore,
    bus: EventBus,
    sessions: Arc<Mutex<HashMap<StreamId, CancellationToken>>>,
}

impl Dispatcher {
    pub fn new(store: ConfigStore) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("reqwest client configuration is valid");
        Dispatcher {
            client,
            store,
            bus: EventBus::new(),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribes to the `llm-stream` event channel.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<NormalizedEvent> {
        self.bus.subscribe()
    }

    /// Validates `record`, mints a fresh `stream_id`, registers the
    /// session, spawns its driver, and returns the id without waiting
    /// for the first byte.
    pub fn start_stream(&self, record: ProviderRecord, prompts: PromptPair) -> Result<StreamId> {
        record
            .validate()
            .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;

        let stream_id = StreamId::new();
        let cancel = CancellationToken::new();
        self.sessions.lock().unwrap().insert(stream_id, cancel.clone());

        let adapter = for_kind(record.kind);
        let session = StreamSession::new(
            stream_id,
            self.client.clone(),
            record,
            prompts,
            adapter,
            self.bus.clone(),
            cancel,
        );

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            session.run().await;
            sessions.lock().unwrap().remove(&stream_id);
        });

        Ok(stream_id)
    }

    /// Signals cancellation for `stream_id`. Idempotent; an unknown id
    /// is a no-op.
    pub fn cancel_stream(&self, stream_id: StreamId) {
        if let Some(cancel) = self.sessions.lock().unwrap().get(&stream_id) {
            cancel.cancel();
        }
    }

    /// Minimal connectivity probe: starts a stream with a trivial
    /// prompt, waits for either a first delta or a terminal marker, and
    /// cancels it if still active. Does not publish on `llm-stream`.
    pub async fn test_connection(&self, record: ProviderRecord) -> Result<()> {
        record
            .validate()
            .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;

        let mut adapter = for_kind(record.kind);
        let request = adapter.build_request(
            &self.client,
            &record,
            &PromptPair { user: PROBE_PROMPT.to_string(), system: None },
        );

        let response = request.send().await?;
        if response.status().as_u16() >= 400 {
            let status = response.status().as_u16();
            let excerpt = response.text().await.unwrap_or_default();
            return Err(GatewayError::ProviderError { status, excerpt });
        }

        use futures_util::StreamExt;
        let mut byte_stream = response.bytes_stream();
        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk?;
            let events = adapter.feed(&bytes)?;
            for event in events {
                match event {
                    crate::adapters::ParsedEvent::Delta(_) => return Ok(()),
                    crate::adapters::ParsedEvent::Done => return Ok(()),
                    crate::adapters::ParsedEvent::Error(detail) => {
                        return Err(GatewayError::ProtocolError { detail });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        self.store.load()
    }

    pub fn save_config(&self, config: AppConfig) -> Result<()> {
        self.store.save(config)
    }

    pub fn set_default_provider(&self, name: &str) -> Result<()> {
        self.store.set_default(name)
    }

    pub fn config_path(&self) -> String {
        self.store.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    fn test_dispatcher() -> (Dispatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        (Dispatcher::new(store), dir)
    }

    fn openai_record(base_url: String) -> ProviderRecord {
        ProviderRecord {
            kind: ProviderKind::OpenAiCompatible,
            base_url,
            api_key: "k".to_string(),
            model: "gpt-4o".to_string(),
            context_window: None,
            api_version: None,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn start_stream_with_empty_claude_api_version_fails_before_network() {
        let (dispatcher, _dir) = test_dispatcher();
        let record = ProviderRecord {
            kind: ProviderKind::Claude,
            base_url: "https://api.anthropic.com".to_string(),
            api_key: "k".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            context_window: None,
            api_version: None,
            extra: Default::default(),
        };
        let result = dispatcher.start_stream(record, PromptPair { user: "hi".to_string(), system: None });
        assert!(matches!(result, Err(GatewayError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn cancel_stream_is_idempotent_and_unknown_id_is_noop() {
        let (dispatcher, _dir) = test_dispatcher();
        let unknown = StreamId::new();
        dispatcher.cancel_stream(unknown);
        dispatcher.cancel_stream(unknown);
    }

    #[tokio::test]
    async fn concurrent_streams_interleave_but_each_subsequence_is_valid() {
        let (dispatcher, _dir) = test_dispatcher();
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("data: {\"choices\":[{\"delta\":{\"content\":\"x\"},\"finish_reason\":\"stop\"}]}\n")
            .expect_at_least(2)
            .create_async()
            .await;

        let mut rx = dispatcher.subscribe();
        let s1 = dispatcher
            .start_stream(openai_record(server.url()), PromptPair { user: "a".to_string(), system: None })
            .unwrap();
        let s2 = dispatcher
            .start_stream(openai_record(server.url()), PromptPair { user: "b".to_string(), system: None })
            .unwrap();

        let mut seen_done = std::collections::HashSet::new();
        while seen_done.len() < 2 {
            let event = rx.recv().await.unwrap();
            assert!(event.stream_id == s1 || event.stream_id == s2);
            if event.done {
                seen_done.insert(event.stream_id);
            }
        }
    }

    #[tokio::test]
    async fn load_save_set_default_pass_through_to_store() {
        let (dispatcher, _dir) = test_dispatcher();
        let config = dispatcher.load_config().unwrap();
        assert_eq!(config.default, "openai");
        dispatcher.save_config(config).unwrap();
        assert!(dispatcher.set_default_provider("openai").is_ok());
        assert!(matches!(
            dispatcher.set_default_provider("nope"),
            Err(GatewayError::UnknownProvider(_))
        ));
    }
}
