//! Append-only chat transcript, persisted after every message.

use anyhow::{Context, Result};
use shared::transcript::{ChatMessage, MessageKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::BlobStore;

pub const CHAT_HISTORY_BLOB: &str = "chat_history";

/// How many earlier messages go into a plain-chat prompt
pub const MAX_HISTORY_FOR_PROMPT: usize = 6;

/// Where [`TranscriptStore::load`] found the history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    ImportFile(PathBuf),
    Stored,
    Empty,
}

pub struct TranscriptStore {
    store: Arc<dyn BlobStore>,
    messages: Vec<ChatMessage>,
}

impl TranscriptStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            messages: Vec::new(),
        }
    }

    /// Replace the in-memory transcript with the best available source.
    ///
    /// A non-empty import file wins and is copied into the primary store.
    /// Otherwise the stored blob is used; an unreadable blob is dropped.
    pub fn load(&mut self, import: Option<&Path>) -> LoadSource {
        if let Some(path) = import {
            if let Some(messages) = read_import(path) {
                self.messages = messages;
                if let Err(e) = self.persist() {
                    warn!("Could not mirror imported history: {:#}", e);
                }
                return LoadSource::ImportFile(path.to_path_buf());
            }
        }

        self.messages.clear();
        let raw = match self.store.load(CHAT_HISTORY_BLOB) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadSource::Empty,
            Err(e) => {
                warn!("Could not read chat history: {:#}", e);
                return LoadSource::Empty;
            }
        };

        match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
            Ok(messages) if !messages.is_empty() => {
                self.messages = messages;
                LoadSource::Stored
            }
            Ok(_) => LoadSource::Empty,
            Err(e) => {
                warn!("Stored chat history is corrupt, clearing it: {}", e);
                if let Err(e) = self.store.remove(CHAT_HISTORY_BLOB) {
                    warn!("Could not remove corrupt chat history: {:#}", e);
                }
                LoadSource::Empty
            }
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Record a finished message. It stays in memory even if the write fails.
    pub fn append(&mut self, message: ChatMessage) -> Result<()> {
        self.messages.push(message);
        self.persist()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.messages.clear();
        self.store
            .remove(CHAT_HISTORY_BLOB)
            .context("Failed to clear chat history")
    }

    /// The last `limit` messages as "User: ..." / "AI: ..." lines.
    pub fn recent_for_prompt(&self, limit: usize) -> String {
        let start = self.messages.len().saturating_sub(limit);

        self.messages[start..]
            .iter()
            .map(|m| {
                let label = if m.kind == MessageKind::User { "User" } else { "AI" };
                let text = if m.kind == MessageKind::User && m.has_image && m.text.trim().is_empty() {
                    "[Image]"
                } else {
                    m.text.as_str()
                };
                format!("{}: {}", label, text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.messages)?;
        self.store
            .save(CHAT_HISTORY_BLOB, &json)
            .context("Failed to save chat history")
    }
}

fn read_import(path: &Path) -> Option<Vec<ChatMessage>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            info!("No history import at {:?}: {}", path, e);
            return None;
        }
    };
    match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
        Ok(messages) if !messages.is_empty() => Some(messages),
        Ok(_) => {
            info!("History import {:?} is empty", path);
            None
        }
        Err(e) => {
            warn!("History import {:?} is not a valid message list: {}", path, e);
            None
        }
    }
}

/// Assemble the plain-chat prompt: system text, recent history, then the
/// current user line and an open "AI:" turn.
pub fn build_chat_prompt(system: &str, history: &str, input: &str, has_image: bool) -> String {
    let mut prompt = format!("{}\n\n", system);
    if !history.is_empty() {
        prompt.push_str(&format!("Previous conversation:\n{}\n\n", history));
    }
    prompt.push_str("User: ");
    if has_image {
        prompt.push_str("[Image Provided] ");
    }
    prompt.push_str(input);
    prompt.push_str("\nAI:");
    prompt
}
