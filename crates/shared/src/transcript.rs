use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::lenient;

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Ai,
    Tutor,
}

impl MessageKind {
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::User => "You",
            MessageKind::Ai => "AI",
            MessageKind::Tutor => "Tutor",
        }
    }
}

/// One persisted chat message. The JSON layout matches exported transcripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "hasImage", default)]
    pub has_image: bool,
    #[serde(rename = "imageBase64", default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            has_image: false,
            image_base64: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageKind::User, text)
    }

    pub fn user_with_image(text: impl Into<String>, image_base64: String) -> Self {
        Self {
            has_image: true,
            image_base64: Some(image_base64),
            ..Self::new(MessageKind::User, text)
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Ai, text)
    }

    pub fn tutor(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Tutor, text)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// "HH:MM" for display; empty if the stored timestamp is out of range.
    pub fn time_label(&self) -> String {
        self.created_at()
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_default()
    }
}
