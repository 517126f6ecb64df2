use anyhow::{Context, Result};
use base64::Engine;
use directories::ProjectDirs;
use services::BlobStore;
use shared::settings::{parse_temperature, AppSettings};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Overrides the platform data directory
pub const DATA_DIR_ENV: &str = "TUTORAI_DATA_DIR";

pub const SETTINGS_BLOB: &str = "settings";

/// Directory holding the settings, chat history and learner state blobs
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir));
        }
    }
    ProjectDirs::from("org", "tutorai", "TutorAI").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Load settings from the store or return defaults.
/// The flag tells whether a stored settings blob was used.
pub fn load_settings_or_default(store: &dyn BlobStore) -> (AppSettings, bool) {
    let raw = match store.load(SETTINGS_BLOB) {
        Ok(Some(raw)) => raw,
        Ok(None) => return (AppSettings::default(), false),
        Err(e) => {
            warn!("{:#}", e);
            return (AppSettings::default(), false);
        }
    };
    match serde_json::from_str::<AppSettings>(&raw) {
        Ok(settings) => (settings, true),
        Err(e) => {
            warn!("Ignoring unreadable settings: {}", e);
            (AppSettings::default(), false)
        }
    }
}

/// Apply OLLAMA_ENDPOINT, OLLAMA_MODEL and OLLAMA_TEMPERATURE.
pub fn apply_env_overrides<F>(settings: &mut AppSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let set = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(endpoint) = set("OLLAMA_ENDPOINT") {
        info!("endpoint from environment: {}", endpoint);
        settings.ollama.endpoint = endpoint;
    }
    if let Some(model) = set("OLLAMA_MODEL") {
        settings.ollama.model = model;
    }
    if let Some(raw) = set("OLLAMA_TEMPERATURE") {
        match parse_temperature(&raw) {
            Some(t) => settings.ollama.temperature = t,
            None => warn!("OLLAMA_TEMPERATURE={:?} is not a number, keeping {}", raw, settings.ollama.temperature),
        }
    }
}

/// Read an image attachment as base64, unresized.
pub fn load_image_base64(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image {:?}", path))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Transcript text for a failed chat turn
pub fn format_error_message(error: &str) -> String {
    format!("Error communicating with AI: {}", error)
}
