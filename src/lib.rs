//! Streaming LLM gateway core: a typed provider catalogue, a
//! protocol-adapter layer for OpenAI-compatible, Claude, and Gemini
//! streaming endpoints, and a stream dispatcher that drives and
//! normalizes concurrent, cancellable generations.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod session;
