use thiserror::Error;

/// Result type alias, using [`GatewayError`] as the error type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Unified error type for the gateway core.
///
/// Configuration and validation errors surface directly as operation
/// failures. Session-local errors (`ProviderError`, `ProtocolError`,
/// `UnexpectedEnd`, `NetworkError`) are instead carried as the `error`
/// field of a terminal stream event — see [`crate::dispatcher`].
///
/// None of these variants ever format an API key or full prompt body.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No configuration document exists on disk and the caller did not
    /// ask for one to be seeded.
    #[error("no configuration document found at {path}")]
    ConfigMissing { path: String },

    /// The configuration document was parsed but fails a model invariant
    /// (missing default provider, empty provider map, Claude entry
    /// without `api_version`, ...).
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Filesystem read or write of the configuration document failed.
    #[error("configuration I/O error: {0}")]
    ConfigIoError(#[from] std::io::Error),

    /// A `ProviderRecord` passed to `start_stream`/`test_connection`
    /// failed validation.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// `set_default` named a provider that is not in the catalogue.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Upstream responded with an HTTP status of 400 or above.
    #[error("provider returned HTTP {status}: {excerpt}")]
    ProviderError { status: u16, excerpt: String },

    /// An adapter could not parse a fully-delimited frame.
    #[error("protocol error: {detail}")]
    ProtocolError { detail: String },

    /// The response body closed before a terminal marker was seen.
    #[error("stream ended before a terminal marker was received")]
    UnexpectedEnd,

    /// DNS/TCP/TLS/read failure underneath the HTTP client.
    #[error("network error: {detail}")]
    NetworkError { detail: String },

    /// TOML document could not be parsed.
    #[error("failed to parse configuration document: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML document could not be serialized.
    #[error("failed to serialize configuration document: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::NetworkError { detail: e.to_string() }
    }
}
