use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::config::{PromptPair, ProviderRecord};
use crate::error::{GatewayError, Result};

use super::{parse_sse_line, Adapter, ParsedEvent};

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    choices: Vec<OpenAiDeltaChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDeltaChoice {
    delta: OpenAiDeltaContent,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiDeltaContent {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions adapter. SSE-framed, `data: `
/// lines terminated by blank lines, `data: [DONE]` sentinel ends the
/// stream.
#[derive(Default)]
pub struct OpenAiAdapter {
    buffer: String,
    terminal_seen: bool,
}

impl Adapter for OpenAiAdapter {
    fn build_request(
        &self,
        client: &reqwest::Client,
        record: &ProviderRecord,
        prompts: &PromptPair,
    ) -> RequestBuilder {
        let mut messages = Vec::new();
        if let Some(system) = prompts.system.as_deref() {
            messages.push(OpenAiMessage { role: "system", content: system });
        }
        messages.push(OpenAiMessage { role: "user", content: &prompts.user });

        let body = OpenAiRequest {
            model: &record.model,
            stream: true,
            messages,
        };

        let url = format!("{}/chat/completions", record.base_url.trim_end_matches('/'));
        let mut req = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&body);
        if !record.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", record.api_key));
        }
        req
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<ParsedEvent>> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim().to_string();
            self.buffer = self.buffer[pos + 1..].to_string();

            if line.is_empty() {
                continue;
            }
            let Some(data) = parse_sse_line(&line) else { continue };

            if data == "[DONE]" {
                self.terminal_seen = true;
                events.push(ParsedEvent::Done);
                continue;
            }

            match serde_json::from_str::<OpenAiDelta>(data) {
                Ok(parsed) => {
                    if let Some(choice) = parsed.choices.first() {
                        if let Some(content) = &choice.delta.content {
                            if !content.is_empty() {
                                events.push(ParsedEvent::Delta(content.clone()));
                            }
                        }
                        if choice.finish_reason.is_some() {
                            self.terminal_seen = true;
                            events.push(ParsedEvent::Done);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to parse OpenAI SSE frame: {e}");
                    self.terminal_seen = true;
                    events.push(ParsedEvent::Error(
                        GatewayError::ProtocolError { detail: e.to_string() }.to_string(),
                    ));
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
