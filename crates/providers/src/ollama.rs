use futures::StreamExt;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::settings::OllamaSettings;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::ndjson::NdjsonParser;
use crate::retry::RetryPolicy;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").unwrap());

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
}

/// Single-shot body. Some Ollama-compatible servers nest the text under
/// `message.content` instead of `response`.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    message: Option<MessageBody>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    content: Option<String>,
}

/// Streaming response: each line is one of these JSON objects.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, LlmError> {
        match self.response {
            Some(Value::String(text)) => Ok(text),
            _ => self
                .message
                .and_then(|m| m.content)
                .ok_or(LlmError::MissingPayload),
        }
    }

    fn into_json(self) -> Result<Value, LlmError> {
        match self.response {
            Some(Value::String(text)) => extract_json(&text),
            Some(object @ Value::Object(_)) => Ok(object),
            _ => match self.message.and_then(|m| m.content) {
                Some(text) => extract_json(&text),
                None => Err(LlmError::MissingPayload),
            },
        }
    }
}

/// Client for Ollama's `/api/generate` endpoint.
pub struct OllamaClient {
    http: Client,
    endpoint: String,
    model: String,
    retry: RetryPolicy,
    /// Whole-request bound for single-shot calls; per-read bound for streams
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint).map_err(|e| LlmError::InvalidUrl {
            url: endpoint.clone(),
            reason: e.to_string(),
        })?;
        let http = Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            model: model.into(),
            retry: RetryPolicy::default(),
            timeout,
        })
    }

    pub fn from_settings(settings: &OllamaSettings) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(settings.request_timeout_secs.max(1));
        Ok(Self::new(&settings.endpoint, &settings.model, timeout)?
            .with_retry(RetryPolicy::with_max_retries(settings.max_retries)))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request<'a>(
        &'a self,
        prompt: &'a str,
        image: Option<&'a str>,
        temperature: f64,
        stream: bool,
    ) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            system: None,
            format: None,
            images: image.map(|img| vec![img]),
            options: GenerateOptions { temperature },
        }
    }

    async fn send(&self, request: &GenerateRequest<'_>) -> Result<Response, LlmError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if !request.stream {
            builder = builder.timeout(self.timeout);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                code: status.as_u16(),
                body: error_detail(&body, status),
            });
        }
        Ok(resp)
    }

    async fn send_single(&self, request: &GenerateRequest<'_>) -> Result<GenerateResponse, LlmError> {
        self.retry
            .run("ollama generate", |_| async move {
                let resp = self.send(request).await?;
                resp.json::<GenerateResponse>().await.map_err(LlmError::from)
            })
            .await
    }

    /// Non-streaming generation; returns the whole reply text.
    pub async fn generate(
        &self,
        prompt: &str,
        image: Option<&str>,
        temperature: f64,
    ) -> Result<String, LlmError> {
        let request = self.request(prompt, image, temperature, false);
        self.send_single(&request).await?.into_text()
    }

    /// JSON-mode generation for structured replies.
    pub async fn generate_json(
        &self,
        system: &str,
        prompt: &str,
        temperature: f64,
    ) -> Result<Value, LlmError> {
        let mut request = self.request(prompt, None, temperature, false);
        request.system = Some(system);
        request.format = Some("json");
        let body = self.send_single(&request).await?;
        let value = body.into_json()?;
        debug!("structured reply with {} top-level keys", value.as_object().map_or(0, |o| o.len()));
        Ok(value)
    }

    /// Streaming generation. `on_token` sees every non-empty token as it
    /// arrives; the accumulated reply is returned once the stream is done.
    ///
    /// A failed attempt is retried only if no token was delivered yet, so the
    /// caller never sees duplicated output.
    pub async fn generate_stream<F>(
        &self,
        prompt: &str,
        image: Option<&str>,
        temperature: f64,
        mut on_token: F,
    ) -> Result<String, LlmError>
    where
        F: FnMut(&str),
    {
        let request = self.request(prompt, image, temperature, true);
        let mut attempt = 0;
        loop {
            let mut delivered = false;
            match self.stream_once(&request, &mut on_token, &mut delivered).await {
                Ok(text) => return Ok(text),
                Err(e) if delivered => return Err(LlmError::StreamInterrupted(e.to_string())),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.backoff_for(attempt);
                    warn!(
                        "ollama stream failed (attempt {}): {}; retrying in {:?}",
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn stream_once<F>(
        &self,
        request: &GenerateRequest<'_>,
        on_token: &mut F,
        delivered: &mut bool,
    ) -> Result<String, LlmError>
    where
        F: FnMut(&str),
    {
        let resp = tokio::time::timeout(self.timeout, self.send(request))
            .await
            .map_err(|_| LlmError::Timeout)??;

        // Ollama streams line-delimited JSON
        let mut stream = resp.bytes_stream();
        let mut parser = NdjsonParser::new();
        let mut text = String::new();

        // A long reply is fine as long as the model keeps producing
        while let Some(chunk) = tokio::time::timeout(self.timeout, stream.next())
            .await
            .map_err(|_| LlmError::Timeout)?
        {
            let bytes = chunk?;
            for line in parser.feed(&bytes) {
                if apply_stream_line(&line, &mut text, on_token, delivered) {
                    return Ok(text);
                }
            }
        }
        if let Some(line) = parser.finish() {
            apply_stream_line(&line, &mut text, on_token, delivered);
        }
        Ok(text)
    }
}

/// Handle one stream line. Returns true once the final fragment was seen.
fn apply_stream_line<F>(line: &str, text: &mut String, on_token: &mut F, delivered: &mut bool) -> bool
where
    F: FnMut(&str),
{
    match serde_json::from_str::<StreamChunk>(line) {
        Ok(chunk) => {
            if let Some(token) = chunk.response.as_deref().filter(|t| !t.is_empty()) {
                on_token(token);
                text.push_str(token);
                *delivered = true;
            }
            chunk.done
        }
        Err(e) => {
            warn!("skipping malformed stream line: {} ({})", preview(line), e);
            false
        }
    }
}

/// Pull the JSON object out of a model reply. Tolerates Markdown fences and
/// prose around the object.
pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return require_object(value);
    }

    let candidate = FENCED_JSON
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .or_else(|| {
            let start = trimmed.find('{')?;
            let end = trimmed.rfind('}')?;
            (end > start).then(|| &trimmed[start..=end])
        });

    match candidate {
        Some(candidate) => serde_json::from_str::<Value>(candidate)
            .map_err(|e| LlmError::Decode(e.to_string()))
            .and_then(require_object),
        None => Err(LlmError::Decode(format!(
            "no JSON object in model output: {}",
            preview(trimmed)
        ))),
    }
}

fn require_object(value: Value) -> Result<Value, LlmError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(LlmError::Decode(format!(
            "expected a JSON object, got {}",
            preview(&value.to_string())
        )))
    }
}

/// Ollama reports failures as `{"error": "..."}`; fall back to the raw body.
fn error_detail(body: &str, status: StatusCode) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        preview(body)
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() > LIMIT {
        format!("{}...", text.chars().take(LIMIT).collect::<String>())
    } else {
        text.to_string()
    }
}
