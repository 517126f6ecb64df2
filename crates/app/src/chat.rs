//! Plain chat turns outside tutoring mode.

use providers::OllamaClient;
use services::transcript::{build_chat_prompt, MAX_HISTORY_FOR_PROMPT};
use services::TranscriptStore;
use shared::settings::OllamaSettings;
use shared::transcript::ChatMessage;
use tracing::{error, warn};

use crate::status::StatusBoard;
use crate::utils::format_error_message;

pub const CHAT_SYSTEM_PROMPT: &str = "You are TUTORAI, a helpful and friendly AI assistant.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Replied(String),
    /// The error notice that was added to the transcript instead of a reply
    Failed(String),
}

/// Send one user message and record the reply.
///
/// The reply is appended to the transcript only once it is complete; tokens
/// seen by `on_token` before a failure are not persisted.
pub async fn chat_turn<F>(
    client: &OllamaClient,
    settings: &OllamaSettings,
    transcript: &mut TranscriptStore,
    board: &StatusBoard,
    text: &str,
    image: Option<String>,
    on_token: F,
) -> ChatOutcome
where
    F: FnMut(&str),
{
    let has_image = image.is_some();
    let user_message = match image.clone() {
        Some(data) => ChatMessage::user_with_image(text, data),
        None => ChatMessage::user(text),
    };
    if let Err(e) = transcript.append(user_message) {
        warn!("{:#}", e);
    }

    let history = transcript.recent_for_prompt(MAX_HISTORY_FOR_PROMPT);
    let prompt = build_chat_prompt(CHAT_SYSTEM_PROMPT, &history, text, has_image);
    let temperature = settings.effective_temperature();

    let result = if settings.stream_responses {
        client
            .generate_stream(&prompt, image.as_deref(), temperature, on_token)
            .await
    } else {
        client.generate(&prompt, image.as_deref(), temperature).await
    };

    let (message, outcome) = match result {
        Ok(reply) => {
            board.set_reachable(true);
            (ChatMessage::ai(reply.clone()), ChatOutcome::Replied(reply))
        }
        Err(e) => {
            error!("chat request failed: {}", e);
            board.set_reachable(false);
            let notice = format_error_message(&e.to_string());
            (ChatMessage::ai(notice.clone()), ChatOutcome::Failed(notice))
        }
    };
    if let Err(e) = transcript.append(message) {
        warn!("{:#}", e);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use services::MemoryStore;
    use shared::transcript::MessageKind;
    use std::io::Read;
    use std::sync::Arc;

    fn serve_once(body: &'static str) -> (String, std::thread::JoinHandle<String>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = std::thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut received = String::new();
            let _ = request.as_reader().read_to_string(&mut received);
            let _ = request.respond(tiny_http::Response::from_string(body));
            received
        });
        (format!("http://127.0.0.1:{}/api/generate", port), handle)
    }

    fn settings(endpoint: &str, stream: bool) -> OllamaSettings {
        OllamaSettings {
            endpoint: endpoint.to_string(),
            stream_responses: stream,
            max_retries: 0,
            ..OllamaSettings::default()
        }
    }

    fn client(settings: &OllamaSettings) -> OllamaClient {
        OllamaClient::from_settings(settings).unwrap()
    }

    #[tokio::test]
    async fn test_streamed_reply_is_recorded_after_completion() {
        let (endpoint, server) = serve_once(
            "{\"response\":\"Hola\",\"done\":false}\n{\"response\":\" amigo\",\"done\":false}\n{\"done\":true}\n",
        );
        let settings = settings(&endpoint, true);
        let client = client(&settings);
        let mut transcript = TranscriptStore::new(Arc::new(MemoryStore::new()));
        let board = StatusBoard::new();

        let mut tokens = Vec::new();
        let outcome = chat_turn(&client, &settings, &mut transcript, &board, "hi", None, |t| {
            tokens.push(t.to_string())
        })
        .await;

        assert_eq!(outcome, ChatOutcome::Replied("Hola amigo".into()));
        assert_eq!(tokens, vec!["Hola", " amigo"]);
        assert!(board.is_reachable());

        let messages = transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].kind, MessageKind::User);
        assert_eq!(messages[1].text, "Hola amigo");

        let request: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        let prompt = request["prompt"].as_str().unwrap();
        assert!(prompt.starts_with(CHAT_SYSTEM_PROMPT));
        assert!(prompt.ends_with("User: hi\nAI:"));
        assert_eq!(request["stream"], true);
    }

    #[tokio::test]
    async fn test_image_is_forwarded() {
        let (endpoint, server) = serve_once("{\"response\":\"A cat.\"}");
        let settings = settings(&endpoint, false);
        let client = client(&settings);
        let mut transcript = TranscriptStore::new(Arc::new(MemoryStore::new()));
        let board = StatusBoard::new();

        let outcome = chat_turn(
            &client,
            &settings,
            &mut transcript,
            &board,
            "",
            Some("YWJj".into()),
            |_| {},
        )
        .await;
        assert_eq!(outcome, ChatOutcome::Replied("A cat.".into()));
        assert!(transcript.messages()[0].has_image);

        let request: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(request["images"][0], "YWJj");
        assert!(request["prompt"].as_str().unwrap().contains("User: [Image Provided] "));
    }

    #[tokio::test]
    async fn test_failure_is_recorded_as_ai_message() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let endpoint = format!("http://127.0.0.1:{}/api/generate", port);
        let settings = settings(&endpoint, true);
        let client = client(&settings);
        let mut transcript = TranscriptStore::new(Arc::new(MemoryStore::new()));
        let board = StatusBoard::new();
        board.set_reachable(true);

        let outcome = chat_turn(&client, &settings, &mut transcript, &board, "hi", None, |_| {}).await;

        let ChatOutcome::Failed(notice) = outcome else {
            panic!("expected a failure");
        };
        assert!(notice.starts_with("Error communicating with AI: "));
        assert!(!board.is_reachable());
        let last = transcript.messages().last().unwrap();
        assert_eq!(last.kind, MessageKind::Ai);
        assert_eq!(last.text, notice);
    }
}
