//! Protocol adapters: one per provider family, each exposing a
//! build-request step and a resumable incremental frame parser.

mod claude;
mod gemini;
mod openai;

use reqwest::RequestBuilder;

use crate::config::{PromptPair, ProviderKind, ProviderRecord};
use crate::error::Result;

/// One completed unit parsed out of a provider's streaming frame
/// format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// A piece of generated text to append to the running output.
    Delta(String),
    /// The stream has reached its natural end; no error occurred.
    Done,
    /// The stream ended in a provider-reported error condition, with a
    /// human-readable detail string.
    Error(String),
}

/// A stateless, resumable incremental parser plus request builder for
/// one provider family.
///
/// `feed` is fed successive byte chunks as they arrive off the wire. It
/// must retain any residual, not-yet-delimited bytes internally (hence
/// `&mut self`) and return zero or more [`ParsedEvent`]s completed by
/// this call. Implementations never panic on malformed input after a
/// frame has been fully delimited — a malformed frame becomes
/// `ParsedEvent::Error` via `Err(GatewayError::ProtocolError)`, not a
/// panic.
pub trait Adapter: Send {
    /// Builds the outbound HTTP request for this provider, given its
    /// record and the prompt pair to send.
    fn build_request(
        &self,
        client: &reqwest::Client,
        record: &ProviderRecord,
        prompts: &PromptPair,
    ) -> RequestBuilder;

    /// Feeds one chunk of response bytes, returning the events it
    /// completed.
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<ParsedEvent>>;

    /// Called when the HTTP body closes. Returns `Ok(Some(event))` if
    /// the close itself completes a terminal event (e.g. Gemini, which
    /// treats body-close as implicit completion when no `finishReason`
    /// was seen), `Ok(None)` if a terminal marker was already observed,
    /// or an error if data remains undelimited.
    fn on_body_end(&mut self) -> Result<Option<ParsedEvent>>;
}

/// Constructs a fresh, stateless adapter instance for `kind`.
pub fn for_kind(kind: ProviderKind) -> Box<dyn Adapter> {
    match kind {
        ProviderKind::OpenAiCompatible => Box::new(openai::OpenAiAdapter::default()),
        ProviderKind::Claude => Box::new(claude::ClaudeAdapter::default()),
        ProviderKind::Gemini => Box::new(gemini::GeminiAdapter::default()),
    }
}

/// Parses a single SSE `data: ` line, stripping the prefix. Shared by
/// the OpenAI and Gemini adapters, which frame on single newlines.
pub(crate) fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))
}
