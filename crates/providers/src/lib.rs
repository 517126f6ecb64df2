//! Ollama access: generation requests, stream decoding, retries and the
//! reachability probe.

pub mod error;
pub mod ndjson;
pub mod ollama;
pub mod probe;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_server;

pub use error::LlmError;
pub use ollama::OllamaClient;
pub use probe::{probe, ProbeOutcome};
pub use retry::RetryPolicy;
