use anyhow::{Context, Result};
use providers::OllamaClient;
use services::{BlobStore, FileStore, LearnerStore, LoadSource, TranscriptStore};
use shared::busy::{Activity, BusyFlags};
use shared::settings::AppSettings;
use shared::transcript::ChatMessage;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tutor::{stats, Tutor, TutorEvent};

mod chat;
mod commands;
mod status;
mod utils;

use commands::Command;
use status::StatusBoard;

const PROGRESS_CLEARED: &str = "Your learning progress has been cleared.";
const HISTORY_CLEARED: &str = "Chat history cleared.";
const CLEAR_WHILE_TUTORING: &str = "Exit the tutoring session (/exit) before clearing the chat.";
const NOT_TUTORING: &str = "Tutoring is not active.";
const IMAGE_WHILE_TUTORING: &str = "Images can't be used during a tutoring session.";

struct TutorAiApp {
    settings: AppSettings,
    client: Arc<OllamaClient>,
    transcript: TranscriptStore,
    tutor: Tutor,
    tutor_events: mpsc::UnboundedReceiver<TutorEvent>,
    busy: Arc<BusyFlags>,
    board: Arc<StatusBoard>,
    history_source: LoadSource,
}

impl TutorAiApp {
    fn new(settings: AppSettings, store: Arc<dyn BlobStore>) -> Result<Self> {
        let client = Arc::new(
            OllamaClient::from_settings(&settings.ollama).context("Invalid Ollama settings")?,
        );
        info!("using model {} at {}", client.model(), client.endpoint());

        let mut transcript = TranscriptStore::new(store.clone());
        let import = settings.chat_history_import.as_ref().map(PathBuf::from);
        let history_source = transcript.load(import.as_deref());
        info!("chat history: {:?}, {} messages", history_source, transcript.messages().len());

        let (tx, rx) = mpsc::unbounded_channel();
        let learner = LearnerStore::new(store, settings.known_lang.clone());
        let tutor = Tutor::new(client.clone(), learner, tx);

        Ok(Self {
            settings,
            client,
            transcript,
            tutor,
            tutor_events: rx,
            busy: BusyFlags::new(),
            board: StatusBoard::new(),
            history_source,
        })
    }

    fn prompt(&self) -> String {
        let header = self.board.header(&self.busy).label();
        if self.tutor.is_active() {
            format!("[{}] > ", header)
        } else {
            format!("[{} | /study: {}] > ", header, self.tutor.study_label())
        }
    }

    fn replay_history(&self) {
        for message in self.transcript.messages() {
            print_message(message);
        }
        match &self.history_source {
            LoadSource::ImportFile(path) => println!("-- Chat history loaded from {}", path.display()),
            LoadSource::Stored => println!("-- Chat history restored"),
            LoadSource::Empty => {}
        }
    }

    fn record(&mut self, message: ChatMessage) {
        print_message(&message);
        if let Err(e) = self.transcript.append(message) {
            warn!("{:#}", e);
            eprintln!("(chat history could not be saved)");
        }
    }

    /// Shown once, never saved with the conversation.
    fn notice(&self, text: &str) {
        println!("-- {}", text);
    }

    /// Print tutor output and keep the header in sync with tutoring mode.
    fn drain_tutor_events(&mut self) {
        while let Ok(event) = self.tutor_events.try_recv() {
            match event {
                TutorEvent::Say(text) => self.record(ChatMessage::tutor(text)),
                TutorEvent::Notice(text) => eprintln!("({})", text),
                TutorEvent::Ended => self.board.set_tutoring(false),
            }
        }
        self.board.set_tutoring(self.tutor.is_active());
    }

    /// Returns false when the user asked to quit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let Some(command) = commands::parse(line) else {
            return true;
        };

        match command {
            Command::Quit => return false,
            Command::Help => println!("{}", commands::HELP),
            Command::Unknown(msg) => println!("{}\n{}", msg, commands::HELP),
            Command::Message(text) => {
                if self.tutor.is_active() {
                    self.tutor_turn(&text).await;
                } else {
                    self.chat(&text, None).await;
                }
            }
            Command::Image { path, text } => {
                if self.tutor.is_active() {
                    println!("{}", IMAGE_WHILE_TUTORING);
                    return true;
                }
                match utils::load_image_base64(&path) {
                    Ok(data) => self.chat(&text, Some(data)).await,
                    Err(e) => println!("{:#}", e),
                }
            }
            Command::Study => {
                if self.busy.is_responding() {
                    return true;
                }
                self.board.set_tutoring(true);
                self.tutor.start();
                self.drain_tutor_events();
            }
            Command::Exit => {
                if self.tutor.is_active() {
                    self.tutor.exit();
                    self.drain_tutor_events();
                } else {
                    println!("{}", NOT_TUTORING);
                }
            }
            Command::Stats => print!("{}", stats::render_report(self.tutor.learner_state())),
            Command::Status => {
                let endpoint = self.settings.ollama.endpoint.clone();
                match status::check_now(&endpoint, &self.busy, &self.board).await {
                    Some(outcome) => println!("{}", outcome),
                    None => match self.board.last_probe() {
                        Some(last) => println!("A check is already running. Last result: {}", last),
                        None => println!("A check is already running."),
                    },
                }
            }
            Command::Clear => {
                if self.tutor.is_active() {
                    println!("{}", CLEAR_WHILE_TUTORING);
                } else {
                    match self.transcript.clear() {
                        Ok(()) => self.notice(HISTORY_CLEARED),
                        Err(e) => println!("{:#}", e),
                    }
                }
            }
            Command::Forget => {
                let result = self.tutor.reset_progress();
                self.drain_tutor_events();
                match result {
                    Ok(()) => self.notice(PROGRESS_CLEARED),
                    Err(e) => println!("{:#}", e),
                }
            }
        }
        true
    }

    async fn tutor_turn(&mut self, text: &str) {
        let Some(_guard) = self.busy.try_begin(Activity::TutorResponding) else {
            return;
        };
        if let Err(e) = self.transcript.append(ChatMessage::user(text)) {
            warn!("{:#}", e);
        }
        self.tutor.handle_input(text).await;
        self.drain_tutor_events();
    }

    async fn chat(&mut self, text: &str, image: Option<String>) {
        if self.busy.is_responding() {
            return;
        }
        let Some(_guard) = self.busy.try_begin(Activity::AiResponding) else {
            return;
        };

        print!("AI: ");
        let _ = std::io::stdout().flush();
        let streamed = self.settings.ollama.stream_responses;
        let outcome = chat::chat_turn(
            &self.client,
            &self.settings.ollama,
            &mut self.transcript,
            &self.board,
            text,
            image,
            |token| {
                print!("{}", token);
                let _ = std::io::stdout().flush();
            },
        )
        .await;

        match outcome {
            chat::ChatOutcome::Replied(reply) if !streamed => println!("{}", reply),
            chat::ChatOutcome::Replied(_) => println!(),
            chat::ChatOutcome::Failed(notice) => println!("\n{}", notice),
        }
    }
}

fn print_message(message: &ChatMessage) {
    let image = if message.has_image { " [image]" } else { "" };
    println!(
        "{} {}:{} {}",
        message.time_label(),
        message.kind.label(),
        image,
        message.text
    );
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let dir = utils::data_dir().context("Could not determine a data directory; set TUTORAI_DATA_DIR")?;
    let store: Arc<dyn BlobStore> = Arc::new(FileStore::new(dir.clone()));
    let (mut settings, found) = utils::load_settings_or_default(store.as_ref());
    utils::apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    info!(
        "data dir {:?}, settings {}",
        dir,
        if found { "loaded" } else { "defaults" }
    );

    let mut app = TutorAiApp::new(settings, store)?;
    let monitor = status::spawn_monitor(
        app.settings.ollama.endpoint.clone(),
        Duration::from_secs(app.settings.probe_interval_secs.max(1)),
        app.busy.clone(),
        app.board.clone(),
    );

    println!("TutorAI ({}). Type /help for commands.", app.client.model());
    app.replay_history();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", app.prompt());
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if !app.handle_line(&line).await {
            break;
        }
    }

    monitor.abort();
    Ok(())
}
