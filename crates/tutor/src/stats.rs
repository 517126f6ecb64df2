//! Plain-text learning progress report.

use shared::learner::LearnerState;
use shared::lenient::normalize_fraction;
use std::fmt::Write;

const HISTORY_SHOWN: usize = 5;

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Accuracy as a percentage; values above 1 are taken to be percentages already.
pub fn accuracy_percent(raw: f64) -> f64 {
    normalize_fraction(raw) * 100.0
}

pub fn render_report(state: &LearnerState) -> String {
    let mut out = String::new();

    if state.language_proficiency.is_empty() {
        out.push_str("No languages practiced yet.\n");
    } else {
        out.push_str("Languages practiced:\n");
        for (lang, prof) in &state.language_proficiency {
            let _ = writeln!(
                out,
                "  {}: level {:.2}, accuracy {:.1}%, streak {}",
                capitalize(lang),
                prof.level,
                accuracy_percent(prof.overall_accuracy_estimate),
                prof.correct_streak_session
            );
            if !prof.strengths.is_empty() {
                let _ = writeln!(out, "    Strengths: {}", prof.strengths.join(", "));
            }
            if !prof.weaknesses.is_empty() {
                let _ = writeln!(out, "    Weaknesses: {}", prof.weaknesses.join(", "));
            }
        }
    }

    let focus: Vec<_> = state
        .learning_focus
        .iter()
        .filter(|(_, topics)| !topics.is_empty())
        .collect();
    if !focus.is_empty() {
        out.push_str("\nCurrent learning focus:\n");
        for (lang, topics) in focus {
            let _ = writeln!(out, "  {}: {}", capitalize(lang), topics.join(", "));
        }
    }

    if !state.lesson_history_summary.is_empty() {
        out.push_str("\nRecent lessons:\n");
        for record in state.lesson_history_summary.iter().rev().take(HISTORY_SHOWN) {
            let takeaway = if record.key_takeaway.trim().is_empty() {
                "No summary."
            } else {
                record.key_takeaway.as_str()
            };
            let _ = writeln!(
                out,
                "  {} ({} via {}): {}",
                record.date_utc.format("%Y-%m-%d"),
                record.learn_lang,
                record.lang_pair,
                takeaway
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::learner::{LessonConfig, Proficiency};

    #[test]
    fn test_accuracy_normalization() {
        assert!((accuracy_percent(0.7) - 70.0).abs() < 1e-9);
        assert!((accuracy_percent(70.0) - 70.0).abs() < 1e-9);
        assert_eq!(accuracy_percent(7000.0), 100.0);
        assert_eq!(accuracy_percent(-3.0), 0.0);
    }

    #[test]
    fn test_empty_state() {
        assert_eq!(
            render_report(&LearnerState::default()),
            "No languages practiced yet.\n"
        );
    }

    #[test]
    fn test_full_report() {
        let mut state = LearnerState::default();
        state.language_proficiency.insert(
            "spanish".into(),
            Proficiency {
                level: 0.456,
                overall_accuracy_estimate: 82.0,
                correct_streak_session: 3,
                strengths: vec!["greetings".into()],
                ..Proficiency::default()
            },
        );
        state.add_focus("spanish", "subjunctive");
        let config = LessonConfig::new("spanish", "english", "spanish").unwrap();
        for i in 0..7 {
            state.record_lesson(&config, &format!("lesson {}", i), 5);
        }

        let report = render_report(&state);
        assert!(report.contains("  Spanish: level 0.46, accuracy 82.0%, streak 3\n"));
        assert!(report.contains("    Strengths: greetings\n"));
        assert!(!report.contains("Weaknesses"));
        assert!(report.contains("  Spanish: subjunctive\n"));

        let history: Vec<&str> = report
            .lines()
            .skip_while(|l| *l != "Recent lessons:")
            .skip(1)
            .collect();
        assert_eq!(history.len(), 5);
        assert!(history[0].ends_with("(spanish via english-spanish): lesson 6"));
        assert!(history[4].ends_with("lesson 2"));
    }
}
