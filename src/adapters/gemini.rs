use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::config::{PromptPair, ProviderRecord};
use crate::error::{GatewayError, Result};

use super::{parse_sse_line, Adapter, ParsedEvent};

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction<'a>>,
}

#[derive(Debug, Deserialize)]
struct GeminiStreamChunk {
    candidates: Option<Vec<GeminiStreamCandidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamCandidate {
    content: Option<GeminiStreamContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiStreamContent {
    parts: Option<Vec<GeminiStreamPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiStreamPart {
    text: Option<String>,
}

/// Gemini generateContent adapter. The API key travels in the query
/// string; `alt=sse` requests SSE framing. A non-null `finishReason` or
/// the body closing ends the stream — unlike Claude, an unterminated
/// body is not an error (Gemini does not always send an explicit
/// `finishReason`).
#[derive(Default)]
pub struct GeminiAdapter {
    buffer: String,
    terminal_seen: bool,
}

impl Adapter for GeminiAdapter {
    fn build_request(
        &self,
        client: &reqwest::Client,
        record: &ProviderRecord,
        prompts: &PromptPair,
    ) -> RequestBuilder {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: &prompts.user }],
            }],
            system_instruction: prompts.system.as_deref().map(|system| GeminiSystemInstruction {
                parts: vec![GeminiPart { text: system }],
            }),
        };

        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            record.base_url.trim_end_matches('/'),
            record.model
        );
        client
            .post(url)
            .query(&[("alt", "sse"), ("key", record.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&body)
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

            match serde_json::from_str::<GeminiStreamChunk>(data) {
                Ok(parsed) => {
                    if let Some(candidate) = parsed.candidates.as_ref().and_then(|c| c.first()) {
                        if let Some(parts) = candidate.content.as_ref().and_then(|c| c.parts.as_ref()) {
                            for part in parts {
                                if let Some(text) = &part.text {
                                    if !text.is_empty() {
                                        events.push(ParsedEvent::Delta(text.clone()));
                                    }
                                }
                            }
                        }
                        if let Some(reason) = &candidate.finish_reason {
                            self.terminal_seen = true;
                            if reason == "STOP" || reason == "MAX_TOKENS" {
                                events.push(ParsedEvent::Done);
                            } else {
                                events.push(ParsedEvent::Error(format!(
                                    "generation stopped: {reason}"
                                )));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to parse Gemini SSE frame: {e}");
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
            Ok(Some(ParsedEvent::Done))
        }
    }
}
