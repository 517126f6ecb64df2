//! Typed views of the model's replies. Everything is optional on the wire;
//! the `into_*` methods apply the shape checks each step needs.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::TutorError;

/// Most sentences a lesson uses
pub const LESSON_SENTENCES: usize = 5;

pub fn parse<T: DeserializeOwned>(value: Value) -> Result<T, TutorError> {
    serde_json::from_value(value).map_err(|e| TutorError::Parse(e.to_string()))
}

fn filled(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intention {
    ContinuePrevious,
    NewLessonSpecified,
    ChooseNewLanguage,
    ChooseNewDirection,
    #[serde(other)]
    Unclear,
}

#[derive(Debug, Deserialize)]
pub struct IntentReply {
    #[serde(default)]
    intention: Option<Intention>,
    #[serde(default)]
    learn_lang: Option<String>,
    #[serde(default)]
    input_lang: Option<String>,
    #[serde(default)]
    output_lang: Option<String>,
}

impl IntentReply {
    pub fn intention(&self) -> Result<Intention, TutorError> {
        self.intention
            .ok_or_else(|| TutorError::Shape("no 'intention' in reply".into()))
    }

    pub fn into_triple(self) -> LanguageTriple {
        LanguageTriple {
            learn_lang: filled(self.learn_lang),
            input_lang: filled(self.input_lang),
            output_lang: filled(self.output_lang),
        }
    }
}

/// Whatever part of {learn, input, output} the model could resolve
#[derive(Debug, Default, Deserialize)]
pub struct LanguageTriple {
    #[serde(default)]
    pub learn_lang: Option<String>,
    #[serde(default)]
    pub input_lang: Option<String>,
    #[serde(default)]
    pub output_lang: Option<String>,
}

impl LanguageTriple {
    pub fn cleaned(self) -> Self {
        Self {
            learn_lang: filled(self.learn_lang),
            input_lang: filled(self.input_lang),
            output_lang: filled(self.output_lang),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DirectionReply {
    #[serde(default)]
    input_lang: Option<String>,
    #[serde(default)]
    output_lang: Option<String>,
}

impl DirectionReply {
    /// `(input, output)` when both are present
    pub fn pair(self) -> Option<(String, String)> {
        Some((filled(self.input_lang)?, filled(self.output_lang)?))
    }
}

#[derive(Debug, Deserialize)]
pub struct SentencesReply {
    #[serde(default)]
    sentences: Option<Vec<Value>>,
}

impl SentencesReply {
    /// Non-empty sentences, at most [`LESSON_SENTENCES`].
    pub fn into_sentences(self) -> Result<Vec<String>, TutorError> {
        let sentences: Vec<String> = self
            .sentences
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .take(LESSON_SENTENCES)
            .collect();

        if sentences.is_empty() {
            Err(TutorError::Shape("no usable 'sentences' in reply".into()))
        } else {
            Ok(sentences)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeReply {
    #[serde(default)]
    your_corrections: Option<String>,
    #[serde(default)]
    your_advice: Option<String>,
    #[serde(default)]
    updated_user_state: Option<Value>,
}

#[derive(Debug)]
pub struct Feedback {
    pub corrections: String,
    pub advice: String,
    /// Unvalidated; see [`crate::progress::validate`]
    pub updated_state: Option<Value>,
}

impl GradeReply {
    pub fn into_feedback(self) -> Result<Feedback, TutorError> {
        let corrections = filled(self.your_corrections)
            .ok_or_else(|| TutorError::Shape("no 'your_corrections' in reply".into()))?;
        let advice = filled(self.your_advice)
            .ok_or_else(|| TutorError::Shape("no 'your_advice' in reply".into()))?;
        Ok(Feedback {
            corrections,
            advice,
            updated_state: self.updated_user_state,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ConcludeReply {
    #[serde(default)]
    lesson_summary_text: Option<String>,
    #[serde(default)]
    motivational_message: Option<String>,
    #[serde(default)]
    next_focus_suggestion: Option<String>,
}

#[derive(Debug)]
pub struct LessonSummary {
    /// Empty when the model gave none
    pub summary: Option<String>,
    pub motivation: String,
    pub next_focus: Option<String>,
}

impl ConcludeReply {
    pub fn into_summary(self) -> Result<LessonSummary, TutorError> {
        let motivation = filled(self.motivational_message)
            .ok_or_else(|| TutorError::Shape("no 'motivational_message' in reply".into()))?;
        Ok(LessonSummary {
            summary: filled(self.lesson_summary_text),
            motivation,
            next_focus: filled(self.next_focus_suggestion),
        })
    }
}
