//! Request blueprints: the JSON objects describing each tutor step to the
//! model, including the reply shape it must produce.

use serde_json::{json, Value};
use shared::learner::{LearnerState, LessonConfig};

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

/// Returning learner: interpret their answer to "continue or change?".
pub fn initial_intent(state: &LearnerState, user_reply: &str, known_lang: &str) -> Value {
    let prefs = &state.user_preferences;
    let last_learn = prefs.last_learn_lang.as_deref();
    let last_input = prefs.last_input_lang.as_deref();
    let last_output = prefs.last_output_lang.as_deref();

    json!({
        "system_instruction": format!(
            "You are an AI assistant helping a user start a language lesson. The user was reminded of their previous session: learning '{}', translating from '{}' to '{}'. Their known/primary language is '{}'. Analyze their response to understand their intention for the current session. They might want to continue, switch languages, change translation directions, or specify a completely new setup. Pay attention if they mention specific languages or translation directions.",
            or_na(last_learn), or_na(last_input), or_na(last_output), known_lang
        ),
        "user_previous_session_context": {
            "last_learn_lang": last_learn,
            "last_input_lang": last_input,
            "last_output_lang": last_output,
        },
        "user_current_response": user_reply,
        "known_lang": known_lang,
        "current_user_state_summary": {
            "language_proficiency": state.language_proficiency,
        },
        "desired_output_format": {
            "description": "Return a JSON object indicating the user's intention and any specified languages. 'intention' can be 'continue_previous', 'new_lesson_specified', 'choose_new_language', 'choose_new_direction', 'unclear'. If 'new_lesson_specified', fill in 'learn_lang', 'input_lang', 'output_lang'. If only language is new, fill 'learn_lang'. If only direction is new, set 'intention' to 'choose_new_direction' and 'learn_lang' to last_learn_lang.",
            "example": {
                "intention": "continue_previous",
                "learn_lang": "spanish",
                "input_lang": "spanish",
                "output_lang": "english"
            }
        }
    })
}

/// Extract the full language triple from free text.
pub fn direction_setup(state: &LearnerState, user_reply: &str, known_lang: &str) -> Value {
    json!({
        "system_instruction": format!(
            "You are an AI assistant helping a user set up a language lesson. Their known/primary language is '{known}'. Analyze their response to identify: 1. The language they want to learn/practice ('learn_lang'). 2. The source language for translation ('input_lang'). 3. The target language for translation ('output_lang'). One of input/output should be 'learn_lang'. The other is often '{known}' unless specified otherwise.",
            known = known_lang
        ),
        "user_current_response": user_reply,
        "known_lang": known_lang,
        "current_user_state_summary": {
            "language_proficiency": state.language_proficiency,
            "user_preferences": state.user_preferences,
        },
        "desired_output_format": {
            "description": "Return a JSON object with 'learn_lang', 'input_lang', and 'output_lang'. Ensure language names are lowercase English (e.g., 'spanish'). If any part is unclear, set the respective field(s) to null.",
            "example": {
                "learn_lang": "spanish",
                "input_lang": "english",
                "output_lang": "spanish"
            }
        }
    })
}

/// Decide which of learn/known language is the source, given a fixed learn language.
pub fn direction_clarification(learn_lang: &str, known_lang: &str, user_reply: &str) -> Value {
    json!({
        "system_instruction": format!(
            "The user wants to learn '{learn}'. Their known language is '{known}'. We asked if they want to translate FROM '{learn}' TO '{known}' (for understanding) or FROM '{known}' TO '{learn}' (for production). Analyze their response to determine 'input_lang' and 'output_lang'.",
            learn = learn_lang,
            known = known_lang
        ),
        "learn_lang_context": learn_lang,
        "known_lang_context": known_lang,
        "user_current_response": user_reply,
        "desired_output_format": {
            "description": format!(
                "Return a JSON object with 'input_lang' and 'output_lang'. Values should be '{}' or '{}'. If unclear, set to null.",
                learn_lang, known_lang
            ),
            "example": {
                "input_lang": known_lang,
                "output_lang": learn_lang
            }
        }
    })
}

pub fn sentences(state: &LearnerState, config: &LessonConfig) -> Value {
    let (learn, input, output) = (config.learn_lang(), config.input_lang(), config.output_lang());
    json!({
        "system_instruction": format!(
            "You are a helpful and encouraging language teaching AI. The student wants to translate 5 sentences from '{input}' to '{output}'. Their primary goal is to improve their '{learn}'. Based on their current learning state for '{learn}', provide 5 sentences in '{input}'. The sentences should be suitable for their proficiency in '{learn}' when translated."
        ),
        "student_learning_state": state,
        "lesson_config": config,
        "desired_output_format": {
            "description": format!(
                "Return a JSON object with a single key 'sentences', which is an array of 5 strings in '{input}'."
            ),
            "example": {
                "sentences": ["sentence1", "sentence2", "sentence3", "sentence4", "sentence5"]
            }
        }
    })
}

/// Grade one translation. The full learner state goes along so the model can
/// report updated proficiency.
pub fn grade(state: &LearnerState, config: &LessonConfig, original: &str, translation: &str) -> Value {
    let (learn, input, output) = (config.learn_lang(), config.input_lang(), config.output_lang());
    json!({
        "system_instruction": format!(
            "You are a helpful and encouraging language teaching AI. The student is learning '{learn}'. They translated a sentence from '{input}' to '{output}'. Evaluate their translation, provide corrections and advice, and update their entire learning state."
        ),
        "exercise_details": {
            "learn_lang": learn,
            "input_lang": input,
            "original_sentence": original,
            "output_lang": output,
            "user_translation": translation,
        },
        "student_learning_state_before_this_interaction": state,
        "desired_output_format": {
            "description": format!(
                "Return a JSON object with 'your_corrections' (string), 'your_advice' (string), and 'updated_user_state' (the *complete, modified* user_state JSON object reflecting changes based on this interaction, especially for '{learn}' proficiency metrics like level, strengths, weaknesses, last_practiced_utc, accuracy, streak). Accuracy should be a decimal value between 0 and 1 (e.g., 0.75 for 75%)."
            ),
            "example": {
                "your_corrections": "...",
                "your_advice": "...",
                "updated_user_state": {
                    "version": state.version,
                    "language_proficiency": {
                        learn: {
                            "level": 0.2,
                            "overall_accuracy_estimate": 0.75
                        }
                    }
                }
            }
        }
    })
}

pub fn conclude(state: &LearnerState, config: &LessonConfig) -> Value {
    let (learn, input, output) = (config.learn_lang(), config.input_lang(), config.output_lang());
    json!({
        "system_instruction": format!(
            "You are a helpful and encouraging language teaching AI. The student has completed a lesson translating 5 sentences from '{input}' to '{output}', focusing on improving their '{learn}'. Summarize their performance, offer motivation, and suggest a next focus."
        ),
        "lesson_context": {
            "learn_lang": learn,
            "input_lang": input,
            "output_lang": output,
        },
        "student_learning_state_after_lesson": state,
        "desired_output_format": {
            "description": format!(
                "Return a JSON object with 'lesson_summary_text' (string, overall summary of the lesson), 'motivational_message' (string), and 'next_focus_suggestion' (string, optional, for '{learn}')."
            ),
            "example": {
                "lesson_summary_text": "You did well on X, but could improve Y.",
                "motivational_message": "Keep practicing!",
                "next_focus_suggestion": "verb conjugations"
            }
        }
    })
}
