use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::config::{PromptPair, ProviderRecord};
use crate::error::{GatewayError, Result};

use super::{Adapter, ParsedEvent};

const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClaudeSseEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: ClaudeTextDelta },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "error")]
    Error { error: ClaudeErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeTextDelta {
    #[serde(rename = "type")]
    delta_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
    message: String,
}

/// Claude messages adapter. SSE-framed with `event:`/`data:` pairs
/// separated by blank lines; `message_stop` is the terminal marker,
/// `system` travels as a top-level request field rather than a message.
#[derive(Default)]
pub struct ClaudeAdapter {
    buffer: String,
    terminal_seen: bool,
}

impl Adapter for ClaudeAdapter {
    fn build_request(
        &self,
        client: &reqwest::Client,
        record: &ProviderRecord,
        prompts: &PromptPair,
    ) -> RequestBuilder {
        let body = ClaudeRequest {
            model: &record.model,
            stream: true,
            max_tokens: DEFAULT_MAX_TOKENS,
            system: prompts.system.as_deref(),
            messages: vec![ClaudeMessage { role: "user", content: &prompts.user }],
        };

        let url = format!("{}/v1/messages", record.base_url.trim_end_matches('/'));
        client
            .post(url)
            .header("x-api-key", &record.api_key)
            .header(
                "anthropic-version",
                record.api_version.as_deref().unwrap_or(""),
            )
            .header("Content-Type", "application/json")
            .json(&body)
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<ParsedEvent>> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find("\n\n") {
            let block = self.buffer[..pos].to_string();
            self.buffer = self.buffer[pos + 2..].to_string();

            for line in block.lines() {
                let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                    continue;
                };
                match serde_json::from_str::<ClaudeSseEvent>(data) {
                    Ok(ClaudeSseEvent::ContentBlockDelta { delta }) => {
                        if delta.delta_type == "text_delta" && !delta.text.is_empty() {
                            events.push(ParsedEvent::Delta(delta.text));
                        }
                    }
                    Ok(ClaudeSseEvent::MessageStop) => {
                        self.terminal_seen = true;
                        events.push(ParsedEvent::Done);
                    }
                    Ok(ClaudeSseEvent::Error { error }) => {
                        self.terminal_seen = true;
                        events.push(ParsedEvent::Error(error.message));
                    }
                    Ok(ClaudeSseEvent::Other) => {}
                    Err(e) => {
                        tracing::warn!("failed to parse Claude SSE frame: {e}");
                        self.terminal_seen = true;
                        events.push(ParsedEvent::Error(
                            GatewayError::ProtocolError { detail: e.to_string() }.to_string(),
                        ));
                    }
                }
            }
        }

        Ok(events)
    }

    fn on_body_end(&mut self) -> Result<Option<ParsedEvent>> {
        if self.terminal_seen {
            Ok(None)
        } else {
            Ok(Some(ParsedEvent::Error(GatewayError::UnexpectedEnd.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn content_block_delta_then_message_stop() {
        let mut adapter = ClaudeAdapter::default();
        let events = adapter
            .feed(b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\nevent: message_stop\ndata: {}\n\n")
            .unwrap();
        assert_eq!(events, vec![ParsedEvent::Delta("Hi".to_string()), ParsedEvent::Done]);
    }

    #[test]
    fn error_event_is_terminal_error() {
        let mut adapter = ClaudeAdapter::default();
        let events = adapter
            .feed(b"event: error\ndata: {\"type\":\"error\",\"error\":{\"message\":\"overloaded\"}}\n\n")
            .unwrap();
        assert_eq!(events, vec![ParsedEvent::Error("overloaded".to_string())]);
        assert!(adapter.on_body_end().unwrap().is_none());
    }

    #[test]
    fn malformed_json_frame_yields_terminal_error() {
        let mut adapter = ClaudeAdapter::default();
        let events = adapter
            .feed(b"event: content_block_delta\ndata: {not json}\n\n")
            .unwrap();
        assert!(matches!(events.as_slice(), [ParsedEvent::Error(_)]));
        assert!(adapter.on_body_end().unwrap().is_none());
    }

    #[test]
    fn unknown_event_is_ignored() {
        let mut adapter = ClaudeAdapter::default();
        let events = adapter
            .feed(b"event: message_start\ndata: {\"type\":\"message_start\"}\n\n")
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn request_carries_anthropic_version_header_and_system_field() {
        let client = reqwest::Client::new();
        let record = ProviderRecord {
            kind: crate::config::ProviderKind::Claude,
            base_url: "https://api.anthropic.com".to_string(),
            api_key: "k".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            context_window: None,
            api_version: Some("2023-06-01".to_string()),
            extra: Default::default(),
        };
        let prompts = PromptPair { user: "hi".to_string(), system: Some("You are terse.".to_string()) };
        let adapter = ClaudeAdapter::default();
        let req = adapter.build_request(&client, &record, &prompts).build().unwrap();
        assert_eq!(
            req.headers().get("anthropic-version").unwrap().to_str().unwrap(),
            "2023-06-01"
        );
        let body = req.body().unwrap().as_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["system"], "You are terse.");
        assert!(json["messages"][0]["content"] == "hi");
    }

    #[test]
    fn body_closing_without_message_stop_is_unexpected_end() {
        let mut adapter = ClaudeAdapter::default();
        let _ = adapter
            .feed(b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"partial\"}}\n\n")
            .unwrap();
        assert!(matches!(adapter.on_body_end().unwrap(), Some(ParsedEvent::Error(_))));
    }
}
