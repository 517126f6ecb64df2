/// Everything that can go wrong talking to the generation endpoint
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to Ollama timed out")]
    Timeout,

    #[error("could not reach Ollama: {0}")]
    Transport(String),

    #[error("Ollama API error: {code} - {body}")]
    Status { code: u16, body: String },

    #[error("could not decode Ollama response: {0}")]
    Decode(String),

    #[error("Ollama response carried no usable payload")]
    MissingPayload,

    #[error("stream interrupted after partial output: {0}")]
    StreamInterrupted(String),
}

impl LlmError {
    /// Transient failures worth another attempt. Client errors (4xx) and
    /// undecodable bodies would fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::Transport(_) => true,
            LlmError::Status { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_builder() {
            LlmError::InvalidUrl {
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
                reason: e.to_string(),
            }
        } else if e.is_decode() {
            LlmError::Decode(e.to_string())
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}
