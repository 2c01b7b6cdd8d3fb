use llm_stream_gateway::config::{AppConfig, ConfigStore, ProviderKind, ProviderRecord};
use llm_stream_gateway::dispatcher::Dispatcher;

fn claude_record(base_url: String) -> ProviderRecord {
    ProviderRecord {
        kind: ProviderKind::Claude,
        base_url,
        api_key: "k".to_string(),
        model: "claude-sonnet-4-20250514".to_string(),
        context_window: None,
        api_version: Some("2023-06-01".to_string()),
        extra: Default::default(),
    }
}

fn gemini_record(base_url: String) -> ProviderRecord {
    ProviderRecord {
        kind: ProviderKind::Gemini,
        base_url,
        api_key: "gk".to_string(),
        model: "gemini-1.5-flash".to_string(),
        context_window: None,
        api_version: None,
        extra: Default::default(),
    }
}

#[tokio::test]
async fn claude_happy_path_sends_anthropic_version_header_and_system_field() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "system": "You are terse."
        })))
        .with_status(200)
        .with_body(concat!(
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: message_stop\ndata: {}\n\n",
        ))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Dispatcher::new(ConfigStore::new(dir.path().join("config.toml")));
    let mut rx = dispatcher.subscribe();

    let stream_id = dispatcher
        .start_stream(
            claude_record(server.url()),
            llm_stream_gateway::config::PromptPair {
                user: "hi".to_string(),
                system: Some("You are terse.".to_string()),
            },
        )
        .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.stream_id, stream_id);
    assert_eq!(first.delta, "Hi");
    assert!(second.done && second.error.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn gemini_happy_path_uses_streamgeneratecontent_url_and_query_key() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-1.5-flash:streamGenerateContent")
        .match_query(mockito::Matcher::UrlEncoded("key".into(), "gk".into()))
        .with_status(200)
        .with_body(concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"he\"}]}}]}\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"llo\"}]},\"finishReason\":\"STOP\"}]}\n",
        ))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Dispatcher::new(ConfigStore::new(dir.path().join("config.toml")));
    let mut rx = dispatcher.subscribe();

    dispatcher
        .start_stream(
            gemini_record(server.url()),
            llm_stream_gateway::config::PromptPair { user: "hello".to_string(), system: None },
        )
        .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    let third = rx.recv().await.unwrap();
    assert_eq!(first.delta, "he");
    assert_eq!(second.delta, "llo");
    assert!(third.done);
    mock.assert_async().await;
}

#[test]
fn configuration_document_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path().join("config.toml"));

    let mut config = AppConfig::seeded();
    config.providers.insert(
        "claude".to_string(),
        ProviderRecord {
            kind: ProviderKind::Claude,
            base_url: "https://api.anthropic.com".to_string(),
            api_key: "sk-ant".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            context_window: None,
            api_version: Some("2023-06-01".to_string()),
            extra: Default::default(),
        },
    );

    store.save(config).unwrap();
    let loaded = store.load_strict().unwrap();
    assert!(loaded.providers.contains_key("claude"));
    assert_eq!(loaded.providers["claude"].kind, ProviderKind::Claude);
}
