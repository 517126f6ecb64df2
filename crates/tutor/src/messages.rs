//! What the tutor says.

use shared::learner::LessonConfig;

pub const ASK_LANGUAGE_DIRECTION: &str = "Which language would you like to practice, and in which direction? For example: \"I want to learn Spanish, translating from English to Spanish.\"";
pub const UNCLEAR_INTENT: &str = "Sorry, I didn't quite understand that.";
pub const ERROR_RESPONSE: &str = "Sorry, I had trouble understanding the tutor model's response.";
pub const ERROR_NO_SENTENCES: &str = "Sorry, I couldn't prepare exercises for this lesson. Please try again later.";
pub const SUMMARY_PROCESSING: &str = "Processing lesson summary...";
pub const LESSON_COMPLETE: &str = "Lesson complete! Great work.";
pub const EXITING: &str = "Exiting tutoring mode. You can chat normally again.";
pub const SAVE_FAILED: &str = "Could not save your learning progress. It will be kept for this session only.";

pub const SUMMARY_FALLBACK: &str = "Well done on completing the exercises!";
pub const HISTORY_ERROR_TAKEAWAY: &str = "Lesson completed (summary generation error).";

pub const START_STUDY: &str = "Start study session";

pub fn continue_study(learn_lang: &str) -> String {
    format!("Continue {}", learn_lang)
}

pub fn welcome_back(learn: &str, input: &str, output: &str) -> String {
    format!(
        "Welcome back! Last time you were learning {}, translating from {} to {}. Would you like to continue, or try something different?",
        learn, input, output
    )
}

pub fn ask_direction_clarification(learn: &str, known: &str) -> String {
    format!(
        "Would you like to translate from {learn} to {known} (understanding), or from {known} to {learn} (production)?"
    )
}

pub fn ready_to_start(config: &LessonConfig) -> String {
    format!(
        "Great! Let's practice {}: you'll translate sentences from {} to {}. Preparing your exercises...",
        config.learn_lang(),
        config.input_lang(),
        config.output_lang()
    )
}

pub fn translate_this(output_lang: &str, sentence: &str) -> String {
    format!("Translate into {}:\n\n\"{}\"", output_lang, sentence)
}

pub fn feedback(corrections: &str, advice: &str) -> String {
    format!("Correction:\n{}\n\nAdvice:\n{}", corrections, advice)
}

pub fn lesson_summary(summary: &str, motivation: &str) -> String {
    format!("Lesson Summary:\n{}\n\nMotivation:\n{}", summary, motivation)
}

pub fn next_focus(learn_lang: &str, suggestion: &str) -> String {
    format!("Next focus suggestion for {}: {}", learn_lang, suggestion)
}
