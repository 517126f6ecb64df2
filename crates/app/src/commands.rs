//! Slash commands typed at the prompt.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start (or restart) a tutoring session
    Study,
    /// Leave tutoring mode
    Exit,
    Stats,
    Status,
    Clear,
    /// Forget all learning progress
    Forget,
    Image { path: PathBuf, text: String },
    Help,
    Quit,
    Unknown(String),
    /// Anything that is not a command
    Message(String),
}

pub const HELP: &str = "\
Commands:
  /study               start a language lesson (or continue the last one)
  /exit                leave tutoring mode
  /stats               show learning progress
  /status              check whether Ollama is reachable
  /clear               clear the chat history
  /forget              forget all learning progress
  /image <path> [text] send an image with an optional message
  /help                show this help
  /quit                close TutorAI
Anything else is sent as a message.";

/// Parse one input line. Blank lines yield None.
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Message(line.to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name.to_lowercase().as_str() {
        "study" => Command::Study,
        "exit" => Command::Exit,
        "stats" => Command::Stats,
        "status" => Command::Status,
        "clear" => Command::Clear,
        "forget" => Command::Forget,
        "help" | "?" => Command::Help,
        "quit" | "q" => Command::Quit,
        "image" | "img" => {
            let (path, text) = match args.split_once(char::is_whitespace) {
                Some((path, text)) => (path, text.trim()),
                None => (args, ""),
            };
            if path.is_empty() {
                return Some(Command::Unknown("/image needs a file path".into()));
            }
            Command::Image {
                path: PathBuf::from(path),
                text: text.to_string(),
            }
        }
        other => Command::Unknown(format!("Unknown command: /{}", other)),
    };
    Some(command)
}
