use anyhow::{Context, Result};
use shared::learner::LearnerState;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::BlobStore;

pub const LEARNER_STATE_BLOB: &str = "learner_state";

/// Loads and saves [`LearnerState`], keeping the lesson scratch area empty
/// whenever no tutoring session is running.
pub struct LearnerStore {
    store: Arc<dyn BlobStore>,
    known_lang: String,
}

impl LearnerStore {
    pub fn new(store: Arc<dyn BlobStore>, known_lang: impl Into<String>) -> Self {
        Self {
            store,
            known_lang: known_lang.into(),
        }
    }

    pub fn known_lang(&self) -> &str {
        &self.known_lang
    }

    fn fresh(&self) -> LearnerState {
        LearnerState::new(&self.known_lang)
    }

    /// Never fails: unreadable or outdated state is replaced by defaults.
    pub fn load(&self) -> LearnerState {
        let raw = match self.store.load(LEARNER_STATE_BLOB) {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.fresh(),
            Err(e) => {
                warn!("Could not read learner state, using defaults: {:#}", e);
                return self.fresh();
            }
        };

        let mut state = match serde_json::from_str::<LearnerState>(&raw) {
            Ok(state) if state.has_current_version() => state,
            Ok(state) => {
                info!(
                    "Learner state version '{}' is outdated, resetting",
                    state.version
                );
                return self.reset_to_defaults();
            }
            Err(e) => {
                warn!("Learner state is corrupt, resetting: {}", e);
                return self.reset_to_defaults();
            }
        };

        if !state.current_lesson_data.is_empty() {
            info!("Clearing leftover lesson data from an interrupted session");
            state.clear_current_lesson();
            if let Err(e) = self.save(&state, false) {
                warn!("{:#}", e);
            }
        }
        state
    }

    /// Persist `state`. Outside a tutoring session the stored copy never
    /// carries lesson scratch data.
    pub fn save(&self, state: &LearnerState, tutoring_active: bool) -> Result<()> {
        let json = if tutoring_active || state.current_lesson_data.is_empty() {
            serde_json::to_string_pretty(state)?
        } else {
            let mut cleaned = state.clone();
            cleaned.clear_current_lesson();
            serde_json::to_string_pretty(&cleaned)?
        };
        self.store
            .save(LEARNER_STATE_BLOB, &json)
            .context("Failed to save learning progress")
    }

    /// Forget all learning progress.
    pub fn reset(&self) -> Result<()> {
        self.store
            .remove(LEARNER_STATE_BLOB)
            .context("Failed to clear learning progress")
    }

    fn reset_to_defaults(&self) -> LearnerState {
        let state = self.fresh();
        if let Err(e) = self.save(&state, false) {
            warn!("{:#}", e);
        }
        state
    }
}
