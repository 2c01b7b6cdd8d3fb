use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GatewayError, Result};

/// The closed set of wire protocols an adapter can speak.
///
/// Additional vendors (DeepSeek, Moonshot, Ollama, any self-hosted
/// endpoint) are expressed as `OpenAiCompatible` with a different
/// `base_url`/`model`, not as new variants.
///
/// The external on-disk field name is `type`; `kind` is the in-memory
/// name only. Keep that mapping explicit wherever this enum is
/// (de)serialized — see [`ProviderRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAiCompatible,
    Claude,
    Gemini,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderKind::OpenAiCompatible => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Gemini => "gemini",
        };
        write!(f, "{s}")
    }
}

/// One entry in the provider catalogue.
///
/// `extra` preserves any unknown per-provider keys encountered on load
/// so that a save-then-load round-trip is deep-equal, including fields
/// this binary doesn't understand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProviderRecord {
    /// Validates the invariants from the data model: `base_url` must be
    /// an absolute HTTP/HTTPS URL, and Claude records must carry a
    /// non-empty `api_version`.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| GatewayError::InvalidConfig(format!("base_url is not a valid URL: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(GatewayError::InvalidConfig(
                "base_url must use http or https".to_string(),
            ));
        }
        if self.model.is_empty() {
            return Err(GatewayError::InvalidConfig("model must not be empty".to_string()));
        }
        if matches!(self.kind, ProviderKind::Claude) {
            match &self.api_version {
                Some(v) if !v.is_empty() => {}
                _ => {
                    return Err(GatewayError::InvalidConfig(
                        "Claude providers require a non-empty api_version".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The provider catalogue: a default provider name plus a named map of
/// provider records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub default: String,
    pub providers: HashMap<String, ProviderRecord>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AppConfig {
    /// Validates `default` names an existing, non-empty entry and that
    /// the catalogue is not empty. Does not validate individual
    /// provider records — callers that need that should call
    /// [`ProviderRecord::validate`] per entry.
    pub fn validate(&self) -> Result<()> {
        if self.default.is_empty() {
            return Err(GatewayError::ConfigInvalid("default provider name is empty".to_string()));
        }
        if self.providers.is_empty() {
            return Err(GatewayError::ConfigInvalid("provider catalogue is empty".to_string()));
        }
        if !self.providers.contains_key(&self.default) {
            return Err(GatewayError::ConfigInvalid(format!(
                "default provider '{}' is not in the catalogue",
                self.default
            )));
        }
        Ok(())
    }

    /// The default, seeded catalogue written on first run: a single
    /// OpenAI-compatible entry pointing at the public API with an
    /// empty key.
    pub fn seeded() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderRecord {
                kind: ProviderKind::OpenAiCompatible,
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-4o".to_string(),
                context_window: Some(128_000),
                api_version: None,
                extra: HashMap::new(),
            },
        );
        AppConfig {
            default: "openai".to_string(),
            providers,
            extra: HashMap::new(),
        }
    }
}

/// A user prompt plus an optional system prompt. Free-form UTF-8; no
/// length enforcement at this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPair {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}
