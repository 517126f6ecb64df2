//! Language tutor: a small state machine that drives lessons through
//! JSON round trips with the model.

pub mod blueprint;
pub mod machine;
pub mod messages;
pub mod progress;
pub mod replies;
pub mod stats;

use providers::{LlmError, OllamaClient};
use serde_json::Value;

pub use machine::{Tutor, TutorEvent, TutorState};

pub const TUTOR_SYSTEM_PROMPT: &str = "You are an AI language tutor state machine. You will receive a JSON object describing the current context and user input. Your task is to analyze this input and return a JSON object in the specified 'desired_output_format'. Do NOT add any explanatory text outside the JSON response.";

/// Sampling temperature for every tutor call
pub const TUTOR_TEMPERATURE: f64 = 0.5;

/// Failures of a single tutor round trip
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// Network, HTTP status or timeout
    #[error(transparent)]
    Llm(LlmError),

    /// The model's payload was not usable JSON
    #[error("tutor reply is not valid JSON: {0}")]
    Parse(String),

    /// Valid JSON, wrong shape (missing keys, wrong schema version)
    #[error("tutor reply is missing required data: {0}")]
    Shape(String),
}

impl From<LlmError> for TutorError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Decode(msg) => TutorError::Parse(msg),
            LlmError::MissingPayload => TutorError::Shape(e.to_string()),
            other => TutorError::Llm(other),
        }
    }
}

/// The model behind the tutor. One blueprint in, one JSON object out.
///
/// Note: Uses async_trait for object safety
#[async_trait::async_trait]
pub trait TutorModel: Send + Sync {
    async fn ask(&self, blueprint: &Value) -> Result<Value, TutorError>;
}

#[async_trait::async_trait]
impl TutorModel for OllamaClient {
    async fn ask(&self, blueprint: &Value) -> Result<Value, TutorError> {
        let prompt = render_user_prompt(blueprint);
        let reply = self
            .generate_json(TUTOR_SYSTEM_PROMPT, &prompt, TUTOR_TEMPERATURE)
            .await?;
        Ok(reply)
    }
}

/// Wrap a blueprint in the user prompt sent alongside [`TUTOR_SYSTEM_PROMPT`].
pub fn render_user_prompt(blueprint: &Value) -> String {
    let pretty = serde_json::to_string_pretty(blueprint).unwrap_or_else(|_| blueprint.to_string());
    format!(
        "Current task and state:\n```json\n{}\n```\nPlease provide your response strictly in the 'desired_output_format' JSON structure.",
        pretty
    )
}
