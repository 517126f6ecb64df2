//! Adopting the learner state the model returns after grading.
//!
//! The reply is untrusted: only the progress of the language being studied
//! is taken from it, and only after it passes validation. Preferences,
//! history and the lesson scratch area always stay local.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use shared::learner::{LearnerState, Proficiency, LEARNER_STATE_VERSION};
use shared::lenient;
use std::collections::BTreeMap;
use tracing::debug;

use crate::TutorError;

#[derive(Debug, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    language_proficiency: BTreeMap<String, ProficiencyPatch>,
    #[serde(default)]
    learning_focus: BTreeMap<String, Value>,
}

/// Reported metrics for one language. Fields that are missing or unusable
/// stay `None` and leave the stored value alone.
#[derive(Debug, Default, Deserialize)]
pub struct ProficiencyPatch {
    #[serde(default, deserialize_with = "lenient::f64_or_none")]
    level: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string_list_or_none")]
    strengths: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list_or_none")]
    weaknesses: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::u32_or_none")]
    correct_streak_session: Option<u32>,
    #[serde(default, deserialize_with = "lenient::f64_or_none")]
    overall_accuracy_estimate: Option<f64>,
}

impl ProficiencyPatch {
    fn overlay(self, mut entry: Proficiency) -> Proficiency {
        if let Some(level) = self.level {
            entry.level = level;
        }
        if let Some(strengths) = self.strengths {
            entry.strengths = strengths;
        }
        if let Some(weaknesses) = self.weaknesses {
            entry.weaknesses = weaknesses;
        }
        if let Some(streak) = self.correct_streak_session {
            entry.correct_streak_session = streak;
        }
        if let Some(accuracy) = self.overall_accuracy_estimate {
            entry.overall_accuracy_estimate = accuracy;
        }
        entry.sanitized()
    }
}

/// Parse `updated_user_state` and check its schema version.
pub fn validate(updated: Option<Value>) -> Result<ProgressUpdate, TutorError> {
    let value = updated.ok_or_else(|| TutorError::Shape("no 'updated_user_state' in reply".into()))?;
    if !value.is_object() {
        return Err(TutorError::Shape("'updated_user_state' is not an object".into()));
    }

    let update: ProgressUpdate =
        serde_json::from_value(value).map_err(|e| TutorError::Parse(e.to_string()))?;

    match update.version.as_deref() {
        Some(LEARNER_STATE_VERSION) => Ok(update),
        other => Err(TutorError::Shape(format!(
            "updated state has version {:?}, expected {:?}",
            other, LEARNER_STATE_VERSION
        ))),
    }
}

impl ProgressUpdate {
    /// Fold the update for `learn_lang` into `state`.
    pub fn merge_into(mut self, state: &mut LearnerState, learn_lang: &str, now: DateTime<Utc>) {
        state.ensure_language(learn_lang);

        if let Some(entry) = state.language_proficiency.get_mut(learn_lang) {
            if let Some(patch) = self.language_proficiency.remove(learn_lang) {
                debug!("merging reported progress for {}: {:?}", learn_lang, patch);
                *entry = patch.overlay(std::mem::take(entry));
            }
            entry.last_practiced_utc = Some(now);
        }

        if let Some(topics) = self.learning_focus.remove(learn_lang) {
            let topics = topics.as_array().cloned().unwrap_or_default();
            for topic in topics.iter().filter_map(Value::as_str) {
                state.add_focus(learn_lang, topic);
            }
        }
    }
}
