//! Persisted language-learning progress.
//!
//! Field names follow the JSON the tutor model reads and writes, so the
//! structs serialize directly into prompt blueprints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lenient;
use crate::settings::DEFAULT_KNOWN_LANG;

/// Schema tag; anything else on disk is discarded.
pub const LEARNER_STATE_VERSION: &str = "1.1";

/// Starting level for a language the learner has never practiced
pub const INITIAL_LEVEL: f64 = 0.1;

/// Longest key takeaway kept in lesson history (in characters)
pub const TAKEAWAY_MAX_CHARS: usize = 100;

/// Canonical form for language names: trimmed, lowercase.
pub fn normalize_lang(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LessonConfigError {
    #[error("a language name is missing")]
    EmptyLanguage,
    #[error("input and output language are both '{0}'")]
    SameLanguage(String),
    #[error("'{learn}' is neither the input nor the output language")]
    LearnNotInPair { learn: String },
}

/// The language triple of one lesson.
///
/// Only constructible through [`LessonConfig::new`], so every value upholds
/// `input_lang != output_lang` and `learn_lang ∈ {input_lang, output_lang}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonConfig {
    learn_lang: String,
    input_lang: String,
    output_lang: String,
}

impl LessonConfig {
    pub fn new(learn_lang: &str, input_lang: &str, output_lang: &str) -> Result<Self, LessonConfigError> {
        let learn_lang = normalize_lang(learn_lang);
        let input_lang = normalize_lang(input_lang);
        let output_lang = normalize_lang(output_lang);

        if learn_lang.is_empty() || input_lang.is_empty() || output_lang.is_empty() {
            return Err(LessonConfigError::EmptyLanguage);
        }
        if input_lang == output_lang {
            return Err(LessonConfigError::SameLanguage(input_lang));
        }
        if learn_lang != input_lang && learn_lang != output_lang {
            return Err(LessonConfigError::LearnNotInPair { learn: learn_lang });
        }

        Ok(Self {
            learn_lang,
            input_lang,
            output_lang,
        })
    }

    pub fn learn_lang(&self) -> &str {
        &self.learn_lang
    }

    pub fn input_lang(&self) -> &str {
        &self.input_lang
    }

    pub fn output_lang(&self) -> &str {
        &self.output_lang
    }

    /// "input-output", as stored in lesson history
    pub fn lang_pair(&self) -> String {
        format!("{}-{}", self.input_lang, self.output_lang)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub default_input_lang: Option<String>,
    #[serde(default)]
    pub default_output_lang: Option<String>,
    #[serde(default)]
    pub last_learn_lang: Option<String>,
    #[serde(default)]
    pub last_input_lang: Option<String>,
    #[serde(default)]
    pub last_output_lang: Option<String>,
}

impl UserPreferences {
    fn for_known_lang(known_lang: &str) -> Self {
        Self {
            default_input_lang: None,
            default_output_lang: Some(normalize_lang(known_lang)),
            last_learn_lang: None,
            last_input_lang: None,
            last_output_lang: None,
        }
    }
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self::for_known_lang(DEFAULT_KNOWN_LANG)
    }
}

/// Progress metrics for one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proficiency {
    /// 0.0 (beginner) to 1.0 (fluent)
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub level: f64,
    #[serde(default, deserialize_with = "lenient::datetime_or_none")]
    pub last_practiced_utc: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "lenient::u32_or_zero")]
    pub correct_streak_session: u32,
    /// 0.0 to 1.0
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub overall_accuracy_estimate: f64,
}

impl Default for Proficiency {
    fn default() -> Self {
        Self {
            level: INITIAL_LEVEL,
            last_practiced_utc: None,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            correct_streak_session: 0,
            overall_accuracy_estimate: 0.0,
        }
    }
}

impl Proficiency {
    /// Clamp level and accuracy into [0, 1] and drop duplicate list entries.
    pub fn sanitized(mut self) -> Self {
        self.level = if self.level.is_finite() {
            self.level.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.overall_accuracy_estimate = lenient::normalize_fraction(self.overall_accuracy_estimate);
        dedup_preserving_order(&mut self.strengths);
        dedup_preserving_order(&mut self.weaknesses);
        self
    }
}

fn dedup_preserving_order(items: &mut Vec<String>) {
    let mut seen: Vec<String> = Vec::with_capacity(items.len());
    items.retain(|item| {
        let key = item.trim().to_lowercase();
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}

/// One condensed entry in the learner's lesson history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub date_utc: DateTime<Utc>,
    /// "input-output"
    pub lang_pair: String,
    pub learn_lang: String,
    pub key_takeaway: String,
    #[serde(default)]
    pub exercise_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonInteraction {
    pub original_sentence: String,
    pub user_translation: String,
    pub ai_correction: String,
    pub ai_advice: String,
}

/// Scratch area for the lesson in progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentLesson {
    #[serde(default)]
    pub learn_lang: Option<String>,
    #[serde(default)]
    pub input_lang: Option<String>,
    #[serde(default)]
    pub output_lang: Option<String>,
    #[serde(default)]
    pub interactions: Vec<LessonInteraction>,
}

impl CurrentLesson {
    pub fn is_empty(&self) -> bool {
        self.learn_lang.is_none()
            && self.input_lang.is_none()
            && self.output_lang.is_none()
            && self.interactions.is_empty()
    }

    fn for_config(config: &LessonConfig) -> Self {
        Self {
            learn_lang: Some(config.learn_lang().to_string()),
            input_lang: Some(config.input_lang().to_string()),
            output_lang: Some(config.output_lang().to_string()),
            interactions: Vec::new(),
        }
    }
}

/// Everything the app remembers about the learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerState {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub user_preferences: UserPreferences,
    #[serde(default)]
    pub language_proficiency: BTreeMap<String, Proficiency>,
    #[serde(default)]
    pub learning_focus: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub lesson_history_summary: Vec<LessonRecord>,
    #[serde(default)]
    pub current_lesson_data: CurrentLesson,
}

impl Default for LearnerState {
    fn default() -> Self {
        Self::new(DEFAULT_KNOWN_LANG)
    }
}

impl LearnerState {
    pub fn new(known_lang: &str) -> Self {
        Self {
            version: LEARNER_STATE_VERSION.to_string(),
            user_preferences: UserPreferences::for_known_lang(known_lang),
            language_proficiency: BTreeMap::new(),
            learning_focus: BTreeMap::new(),
            lesson_history_summary: Vec::new(),
            current_lesson_data: CurrentLesson::default(),
        }
    }

    pub fn has_current_version(&self) -> bool {
        self.version == LEARNER_STATE_VERSION
    }

    /// The language triple of the last lesson, if all three parts are known.
    pub fn previous_triple(&self) -> Option<(&str, &str, &str)> {
        let prefs = &self.user_preferences;
        match (
            prefs.last_learn_lang.as_deref(),
            prefs.last_input_lang.as_deref(),
            prefs.last_output_lang.as_deref(),
        ) {
            (Some(learn), Some(input), Some(output)) => Some((learn, input, output)),
            _ => None,
        }
    }

    /// Remember the triple so the next session can offer to continue it.
    pub fn remember_config(&mut self, config: &LessonConfig) {
        let prefs = &mut self.user_preferences;
        prefs.last_learn_lang = Some(config.learn_lang().to_string());
        prefs.last_input_lang = Some(config.input_lang().to_string());
        prefs.last_output_lang = Some(config.output_lang().to_string());
    }

    /// Create proficiency and focus entries for a language on first use.
    pub fn ensure_language(&mut self, lang: &str) {
        self.language_proficiency.entry(lang.to_string()).or_default();
        self.learning_focus.entry(lang.to_string()).or_default();
    }

    pub fn begin_lesson(&mut self, config: &LessonConfig) {
        self.current_lesson_data = CurrentLesson::for_config(config);
    }

    pub fn clear_current_lesson(&mut self) {
        self.current_lesson_data = CurrentLesson::default();
    }

    /// Add a focus topic unless an equivalent one is already listed.
    /// Returns true when the topic was new.
    pub fn add_focus(&mut self, lang: &str, topic: &str) -> bool {
        let topic = topic.trim();
        if topic.is_empty() {
            return false;
        }
        let topics = self.learning_focus.entry(lang.to_string()).or_default();
        if topics.iter().any(|t| t.trim().eq_ignore_ascii_case(topic)) {
            return false;
        }
        topics.push(topic.to_string());
        true
    }

    pub fn record_lesson(&mut self, config: &LessonConfig, takeaway: &str, exercise_count: usize) {
        self.lesson_history_summary.push(LessonRecord {
            date_utc: Utc::now(),
            lang_pair: config.lang_pair(),
            learn_lang: config.learn_lang().to_string(),
            key_takeaway: condense_takeaway(takeaway),
            exercise_count,
        });
    }
}

/// Cut a summary down to a history-sized takeaway.
pub fn condense_takeaway(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > TAKEAWAY_MAX_CHARS {
        let cut: String = text.chars().take(TAKEAWAY_MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
