//! The tutoring session.
//!
//! Each step is one JSON round trip with the model. The step waiting for the
//! user's next line is a [`TutorState`]; [`Tutor::handle_input`] dispatches on
//! it. Every failure path ends in a state that expects input, or in `Exit`.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::learner::{normalize_lang, LearnerState, LessonConfig, LessonInteraction};
use services::LearnerStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::replies::{
    self, ConcludeReply, DirectionReply, GradeReply, IntentReply, Intention, LanguageTriple,
    SentencesReply,
};
use crate::{blueprint, messages, progress, TutorError, TutorModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorState {
    Idle,
    InitialIntent,
    LanguageDirectionSetup,
    DirectionClarification,
    PrepareLesson,
    ExerciseCycle,
    GradeTranslation,
    Conclude,
    Exit,
}

impl TutorState {
    /// States that wait for the user's next line
    pub fn awaits_input(&self) -> bool {
        matches!(
            self,
            TutorState::InitialIntent
                | TutorState::LanguageDirectionSetup
                | TutorState::DirectionClarification
                | TutorState::GradeTranslation
        )
    }
}

/// Output of the tutor for the front end
#[derive(Debug, Clone, PartialEq)]
pub enum TutorEvent {
    /// A tutor message for the transcript
    Say(String),
    /// Passive status note, not part of the conversation
    Notice(String),
    /// Tutoring mode is over; normal chat resumes
    Ended,
}

pub struct Tutor {
    model: Arc<dyn TutorModel>,
    store: LearnerStore,
    events: mpsc::UnboundedSender<TutorEvent>,
    learner: LearnerState,
    known_lang: String,
    active: bool,
    state: TutorState,
    config: Option<LessonConfig>,
    /// Language chosen before the direction is known
    pending_learn: Option<String>,
    sentences: Vec<String>,
    index: usize,
    interactions: Vec<LessonInteraction>,
    trace: Vec<TutorState>,
}

impl Tutor {
    pub fn new(
        model: Arc<dyn TutorModel>,
        store: LearnerStore,
        events: mpsc::UnboundedSender<TutorEvent>,
    ) -> Self {
        let learner = store.load();
        let known_lang = normalize_lang(store.known_lang());
        Self {
            model,
            store,
            events,
            learner,
            known_lang,
            active: false,
            state: TutorState::Idle,
            config: None,
            pending_learn: None,
            sentences: Vec::new(),
            index: 0,
            interactions: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> TutorState {
        self.state
    }

    /// Every state entered since construction, in order
    pub fn trace(&self) -> &[TutorState] {
        &self.trace
    }

    pub fn learner_state(&self) -> &LearnerState {
        &self.learner
    }

    pub fn config(&self) -> Option<&LessonConfig> {
        self.config.as_ref()
    }

    /// Label for the study action: "Start study session" or "Continue <lang>".
    pub fn study_label(&self) -> String {
        let lang = match (&self.config, self.active) {
            (Some(config), true) => Some(config.learn_lang()),
            _ => self.learner.user_preferences.last_learn_lang.as_deref(),
        };
        match lang {
            Some(lang) => messages::continue_study(lang),
            None => messages::START_STUDY.to_string(),
        }
    }

    fn say(&self, text: impl Into<String>) {
        let _ = self.events.send(TutorEvent::Say(text.into()));
    }

    fn enter(&mut self, next: TutorState) {
        debug!("tutor: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.trace.push(next);
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.learner, self.active) {
            warn!("{:#}", e);
            let _ = self
                .events
                .send(TutorEvent::Notice(messages::SAVE_FAILED.to_string()));
        }
    }

    async fn ask<T: DeserializeOwned>(&self, blueprint: &Value) -> Result<T, TutorError> {
        let reply = self.model.ask(blueprint).await?;
        replies::parse(reply)
    }

    /// Begin a session. An already running session is dropped first.
    pub fn start(&mut self) {
        if self.active {
            self.finish(false);
        }
        self.active = true;
        self.learner = self.store.load();
        self.enter(TutorState::Idle);
        info!("tutoring session started");

        let welcome = self
            .learner
            .previous_triple()
            .map(|(learn, input, output)| messages::welcome_back(learn, input, output));
        match welcome {
            Some(text) => {
                self.say(text);
                self.enter(TutorState::InitialIntent);
            }
            None => self.ask_language_direction(),
        }
    }

    /// Route one line of user input to the step waiting for it.
    pub async fn handle_input(&mut self, input: &str) {
        let input = input.trim();
        if !self.active || input.is_empty() {
            return;
        }
        if !self.state.awaits_input() {
            warn!("tutor got input in {:?}, which expects none", self.state);
            return;
        }
        match self.state {
            TutorState::InitialIntent => self.on_initial_intent(input).await,
            TutorState::LanguageDirectionSetup => self.on_direction_setup(input).await,
            TutorState::DirectionClarification => self.on_clarification(input).await,
            TutorState::GradeTranslation => self.on_translation(input).await,
            _ => {}
        }
    }

    /// Leave tutoring mode at the user's request.
    pub fn exit(&mut self) {
        if self.active {
            self.finish(true);
        }
    }

    /// Forget all learning progress; ends a running session.
    pub fn reset_progress(&mut self) -> anyhow::Result<()> {
        if self.active {
            self.finish(false);
        }
        self.learner = LearnerState::new(&self.known_lang);
        self.store.reset()
    }

    fn ask_language_direction(&mut self) {
        self.pending_learn = None;
        self.say(messages::ASK_LANGUAGE_DIRECTION);
        self.enter(TutorState::LanguageDirectionSetup);
    }

    fn ask_clarification(&mut self, learn: &str) {
        let learn = normalize_lang(learn);
        if learn.is_empty() || learn == self.known_lang {
            self.ask_language_direction();
            return;
        }
        self.say(messages::ask_direction_clarification(&learn, &self.known_lang));
        self.pending_learn = Some(learn);
        self.enter(TutorState::DirectionClarification);
    }

    fn previous_config(&self) -> Option<LessonConfig> {
        let (learn, input, output) = self.learner.previous_triple()?;
        LessonConfig::new(learn, input, output).ok()
    }

    async fn on_initial_intent(&mut self, input: &str) {
        let bp = blueprint::initial_intent(&self.learner, input, &self.known_lang);
        let routed = match self.ask::<IntentReply>(&bp).await {
            Ok(reply) => reply.intention().map(|intention| (intention, reply.into_triple())),
            Err(e) => Err(e),
        };

        let (intention, triple) = match routed {
            Ok(routed) => routed,
            Err(e) => {
                warn!("initial intent failed: {}", e);
                self.say(messages::ERROR_RESPONSE);
                self.ask_language_direction();
                return;
            }
        };
        debug!("intention: {:?}", intention);

        match intention {
            Intention::ContinuePrevious => {
                if let Some(config) = self.previous_config() {
                    return self.prepare_lesson(config).await;
                }
            }
            Intention::NewLessonSpecified => {
                if let Some(config) = config_from(&triple) {
                    return self.prepare_lesson(config).await;
                }
            }
            Intention::ChooseNewLanguage => {
                if let Some(learn) = triple.learn_lang.as_deref() {
                    self.ask_clarification(learn);
                    return;
                }
            }
            Intention::ChooseNewDirection | Intention::Unclear => {}
        }
        self.ask_language_direction();
    }

    async fn on_direction_setup(&mut self, input: &str) {
        let bp = blueprint::direction_setup(&self.learner, input, &self.known_lang);
        let triple = match self.ask::<LanguageTriple>(&bp).await {
            Ok(triple) => triple.cleaned(),
            Err(e) => {
                warn!("language setup failed: {}", e);
                self.say(messages::ERROR_RESPONSE);
                self.ask_language_direction();
                return;
            }
        };

        match (&triple.learn_lang, &triple.input_lang, &triple.output_lang) {
            (Some(learn), Some(input), Some(output)) => match LessonConfig::new(learn, input, output) {
                Ok(config) => self.prepare_lesson(config).await,
                Err(e) => {
                    warn!("inconsistent lesson setup: {}", e);
                    self.say(messages::ERROR_RESPONSE);
                    self.ask_language_direction();
                }
            },
            (Some(learn), _, _) => {
                let learn = learn.clone();
                self.ask_clarification(&learn);
            }
            _ => {
                self.say(messages::UNCLEAR_INTENT);
                self.ask_language_direction();
            }
        }
    }

    async fn on_clarification(&mut self, input: &str) {
        let Some(learn) = self.pending_learn.clone() else {
            self.ask_language_direction();
            return;
        };

        let bp = blueprint::direction_clarification(&learn, &self.known_lang, input);
        let pair = match self.ask::<DirectionReply>(&bp).await {
            Ok(reply) => reply.pair(),
            Err(e) => {
                warn!("direction clarification failed: {}", e);
                self.say(messages::ERROR_RESPONSE);
                self.ask_language_direction();
                return;
            }
        };

        let config = pair.and_then(|(input, output)| {
            clarified_config(&learn, &self.known_lang, &input, &output)
        });
        match config {
            Some(config) => self.prepare_lesson(config).await,
            None => {
                self.say(messages::UNCLEAR_INTENT);
                self.ask_clarification(&learn);
            }
        }
    }

    async fn prepare_lesson(&mut self, config: LessonConfig) {
        self.enter(TutorState::PrepareLesson);
        info!(
            "preparing lesson: learn {} ({} -> {})",
            config.learn_lang(),
            config.input_lang(),
            config.output_lang()
        );

        self.pending_learn = None;
        self.learner.remember_config(&config);
        self.learner.ensure_language(config.learn_lang());
        self.learner.begin_lesson(&config);
        self.interactions.clear();
        self.sentences.clear();
        self.index = 0;
        self.persist();
        self.say(messages::ready_to_start(&config));

        let bp = blueprint::sentences(&self.learner, &config);
        self.config = Some(config);

        let sentences = self
            .ask::<SentencesReply>(&bp)
            .await
            .and_then(SentencesReply::into_sentences);
        match sentences {
            Ok(sentences) => {
                debug!("lesson has {} sentences", sentences.len());
                self.sentences = sentences;
                self.next_exercise().await;
            }
            Err(e) => {
                warn!("could not get lesson sentences: {}", e);
                let notice = match e {
                    TutorError::Shape(_) => messages::ERROR_NO_SENTENCES,
                    _ => messages::ERROR_RESPONSE,
                };
                self.say(notice);
                self.finish(true);
            }
        }
    }

    async fn next_exercise(&mut self) {
        self.enter(TutorState::ExerciseCycle);
        let (Some(sentence), Some(config)) = (self.sentences.get(self.index), &self.config) else {
            return self.conclude().await;
        };
        let prompt = messages::translate_this(config.output_lang(), sentence);
        self.say(prompt);
        self.enter(TutorState::GradeTranslation);
    }

    async fn on_translation(&mut self, translation: &str) {
        let (Some(config), Some(original)) = (self.config.clone(), self.sentences.get(self.index).cloned())
        else {
            return self.conclude().await;
        };

        let bp = blueprint::grade(&self.learner, &config, &original, translation);
        let feedback = self
            .ask::<GradeReply>(&bp)
            .await
            .and_then(GradeReply::into_feedback);

        match feedback {
            Ok(feedback) => {
                self.say(messages::feedback(&feedback.corrections, &feedback.advice));

                match progress::validate(feedback.updated_state) {
                    Ok(update) => update.merge_into(&mut self.learner, config.learn_lang(), Utc::now()),
                    Err(e) => warn!("keeping previous learner state: {}", e),
                }

                let interaction = LessonInteraction {
                    original_sentence: original,
                    user_translation: translation.to_string(),
                    ai_correction: feedback.corrections,
                    ai_advice: feedback.advice,
                };
                self.interactions.push(interaction.clone());
                self.learner.current_lesson_data.interactions.push(interaction);
                self.persist();
            }
            Err(e) => {
                warn!("grading failed, skipping sentence {}: {}", self.index + 1, e);
                self.say(messages::ERROR_RESPONSE);
            }
        }

        self.index += 1;
        self.next_exercise().await;
    }

    async fn conclude(&mut self) {
        self.enter(TutorState::Conclude);
        let Some(config) = self.config.clone() else {
            return self.finish(true);
        };
        self.say(messages::SUMMARY_PROCESSING);
        self.learner.current_lesson_data.interactions = self.interactions.clone();

        let bp = blueprint::conclude(&self.learner, &config);
        let summary = self
            .ask::<ConcludeReply>(&bp)
            .await
            .and_then(ConcludeReply::into_summary);
        let exercise_count = self.interactions.len();

        match summary {
            Ok(summary) => {
                let text = summary
                    .summary
                    .unwrap_or_else(|| messages::SUMMARY_FALLBACK.to_string());
                self.say(messages::lesson_summary(&text, &summary.motivation));
                if let Some(focus) = summary.next_focus {
                    self.say(messages::next_focus(config.learn_lang(), &focus));
                    self.learner.add_focus(config.learn_lang(), &focus);
                }
                self.learner.record_lesson(&config, &text, exercise_count);
            }
            Err(e) => {
                warn!("lesson summary failed: {}", e);
                self.say(messages::ERROR_RESPONSE);
                self.learner
                    .record_lesson(&config, messages::HISTORY_ERROR_TAKEAWAY, exercise_count);
            }
        }

        self.learner.clear_current_lesson();
        self.persist();
        self.say(messages::LESSON_COMPLETE);
        self.finish(true);
    }

    fn finish(&mut self, announce: bool) {
        if announce {
            self.say(messages::EXITING);
        }
        self.enter(TutorState::Exit);
        self.active = false;
        self.config = None;
        self.pending_learn = None;
        self.sentences.clear();
        self.index = 0;
        self.interactions.clear();
        self.learner.clear_current_lesson();
        self.persist();
        info!("tutoring session ended");
        let _ = self.events.send(TutorEvent::Ended);
    }
}

fn config_from(triple: &LanguageTriple) -> Option<LessonConfig> {
    match (&triple.learn_lang, &triple.input_lang, &triple.output_lang) {
        (Some(learn), Some(input), Some(output)) => LessonConfig::new(learn, input, output).ok(),
        _ => None,
    }
}

/// A clarified direction must pair the learn language with the known one.
fn clarified_config(learn: &str, known: &str, input: &str, output: &str) -> Option<LessonConfig> {
    let config = LessonConfig::new(learn, input, output).ok()?;
    let other = if config.input_lang() == config.learn_lang() {
        config.output_lang()
    } else {
        config.input_lang()
    };
    (other == known).then_some(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use services::{BlobStore, MemoryStore, LEARNER_STATE_BLOB};
    use std::collections::VecDeque;

    /// Replays canned replies in order and records every blueprint it saw.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<Value, TutorError>>>,
        seen: Mutex<Vec<Value>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<Value, TutorError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().len()
        }

        fn blueprint(&self, i: usize) -> Value {
            self.seen.lock()[i].clone()
        }
    }

    #[async_trait::async_trait]
    impl TutorModel for ScriptedModel {
        async fn ask(&self, blueprint: &Value) -> Result<Value, TutorError> {
            self.seen.lock().push(blueprint.clone());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TutorError::Shape("script exhausted".into())))
        }
    }

    struct Harness {
        tutor: Tutor,
        model: Arc<ScriptedModel>,
        blobs: Arc<MemoryStore>,
        events: mpsc::UnboundedReceiver<TutorEvent>,
    }

    impl Harness {
        fn new(replies: Vec<Result<Value, TutorError>>) -> Self {
            Self::with_blobs(Arc::new(MemoryStore::new()), replies)
        }

        fn with_blobs(blobs: Arc<MemoryStore>, replies: Vec<Result<Value, TutorError>>) -> Self {
            let model = ScriptedModel::new(replies);
            let (tx, rx) = mpsc::unbounded_channel();
            let store = LearnerStore::new(blobs.clone(), "english");
            Self {
                tutor: Tutor::new(model.clone(), store, tx),
                model,
                blobs,
                events: rx,
            }
        }

        fn drain(&mut self) -> Vec<TutorEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn said(&mut self) -> Vec<String> {
            self.drain()
                .into_iter()
                .filter_map(|e| match e {
                    TutorEvent::Say(text) => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn stored(&self) -> LearnerState {
            serde_json::from_str(&self.blobs.load(LEARNER_STATE_BLOB).unwrap().unwrap()).unwrap()
        }
    }

    fn returning_french_learner() -> Arc<MemoryStore> {
        let blobs = Arc::new(MemoryStore::new());
        let mut state = LearnerState::new("english");
        let config = LessonConfig::new("french", "english", "french").unwrap();
        state.remember_config(&config);
        state.ensure_language("french");
        LearnerStore::new(blobs.clone(), "english")
            .save(&state, false)
            .unwrap();
        blobs
    }

    fn five_sentences() -> Result<Value, TutorError> {
        Ok(json!({"sentences": ["s1", "s2", "s3", "s4", "s5"]}))
    }

    fn graded(version: &str, level: f64) -> Result<Value, TutorError> {
        Ok(json!({
            "your_corrections": "Looks right.",
            "your_advice": "Mind the accents.",
            "updated_user_state": {
                "version": version,
                "language_proficiency": {"french": {"level": level}}
            }
        }))
    }

    fn summary() -> Result<Value, TutorError> {
        Ok(json!({
            "lesson_summary_text": "Solid work on greetings.",
            "motivational_message": "Keep going!",
            "next_focus_suggestion": "past tense"
        }))
    }

    #[tokio::test]
    async fn test_fresh_install_resolves_directly_to_lesson() {
        let mut h = Harness::new(vec![
            Ok(json!({"learn_lang": "spanish", "input_lang": "english", "output_lang": "spanish"})),
            five_sentences(),
        ]);

        h.tutor.start();
        assert_eq!(h.tutor.state(), TutorState::LanguageDirectionSetup);
        h.tutor
            .handle_input("I want to learn spanish, translating from english to spanish")
            .await;

        let config = h.tutor.config().unwrap();
        assert_eq!(config.learn_lang(), "spanish");
        assert_eq!(config.input_lang(), "english");
        assert_eq!(config.output_lang(), "spanish");
        assert!(!h.tutor.trace().contains(&TutorState::DirectionClarification));
        assert_eq!(
            h.tutor.trace(),
            &[
                TutorState::Idle,
                TutorState::LanguageDirectionSetup,
                TutorState::PrepareLesson,
                TutorState::ExerciseCycle,
                TutorState::GradeTranslation,
            ]
        );
        assert!(h.said().last().unwrap().contains("\"s1\""));
    }

    #[tokio::test]
    async fn test_returning_user_continues_previous_lesson() {
        let mut h = Harness::with_blobs(
            returning_french_learner(),
            vec![Ok(json!({"intention": "continue_previous"})), five_sentences()],
        );

        h.tutor.start();
        assert_eq!(h.tutor.state(), TutorState::InitialIntent);
        assert!(h.said()[0].starts_with("Welcome back!"));

        h.tutor.handle_input("yes continue").await;

        // One intent call, then straight to sentences; no extraction call
        assert_eq!(h.model.calls(), 2);
        assert!(h.model.blueprint(1).get("lesson_config").is_some());
        assert_eq!(h.tutor.config().unwrap().lang_pair(), "english-french");
        assert_eq!(h.tutor.state(), TutorState::GradeTranslation);
    }

    #[tokio::test]
    async fn test_choose_new_language_asks_for_direction() {
        let mut h = Harness::with_blobs(
            returning_french_learner(),
            vec![
                Ok(json!({"intention": "choose_new_language", "learn_lang": "German"})),
                Ok(json!({"input_lang": "german", "output_lang": "english"})),
                five_sentences(),
            ],
        );
        h.tutor.start();
        h.tutor.handle_input("let's do german instead").await;
        assert_eq!(h.tutor.state(), TutorState::DirectionClarification);
        assert_eq!(h.model.blueprint(0)["known_lang"], "english");

        h.tutor.handle_input("from german please").await;
        let config = h.tutor.config().unwrap();
        assert_eq!(config.learn_lang(), "german");
        assert_eq!(config.lang_pair(), "german-english");
    }

    #[tokio::test]
    async fn test_malformed_replies_always_leave_a_next_step() {
        // Intent: not JSON-shaped -> direction setup
        let mut h = Harness::with_blobs(
            returning_french_learner(),
            vec![Err(TutorError::Parse("garbage".into()))],
        );
        h.tutor.start();
        h.tutor.handle_input("hmm").await;
        assert_eq!(h.tutor.state(), TutorState::LanguageDirectionSetup);
        assert!(h.tutor.is_active());

        // Setup: inconsistent triple, then nothing usable -> loop in setup
        let mut h = Harness::new(vec![
            Ok(json!({"learn_lang": "french", "input_lang": "english", "output_lang": "spanish"})),
            Ok(json!({"learn_lang": null})),
            Err(TutorError::Llm(providers::LlmError::Timeout)),
        ]);
        h.tutor.start();
        for _ in 0..3 {
            h.tutor.handle_input("something").await;
            assert_eq!(h.tutor.state(), TutorState::LanguageDirectionSetup);
        }

        // Clarification: invalid pair loops, model error falls back to setup
        let mut h = Harness::new(vec![
            Ok(json!({"learn_lang": "italian"})),
            Ok(json!({"input_lang": "italian", "output_lang": "spanish"})),
            Ok(json!({"input_lang": "italian"})),
            Err(TutorError::Parse("eof".into())),
        ]);
        h.tutor.start();
        h.tutor.handle_input("italian").await;
        assert_eq!(h.tutor.state(), TutorState::DirectionClarification);
        h.tutor.handle_input("to spanish").await;
        assert_eq!(h.tutor.state(), TutorState::DirectionClarification);
        h.tutor.handle_input("uh").await;
        assert_eq!(h.tutor.state(), TutorState::DirectionClarification);
        h.tutor.handle_input("?").await;
        assert_eq!(h.tutor.state(), TutorState::LanguageDirectionSetup);

        // Sentences missing -> session ends
        let mut h = Harness::new(vec![
            Ok(json!({"learn_lang": "spanish", "input_lang": "english", "output_lang": "spanish"})),
            Ok(json!({"sentences": []})),
        ]);
        h.tutor.start();
        h.tutor.handle_input("spanish from english").await;
        assert_eq!(h.tutor.state(), TutorState::Exit);
        assert!(!h.tutor.is_active());
        assert!(h.drain().contains(&TutorEvent::Ended));
        assert!(h.stored().current_lesson_data.is_empty());
    }

    #[tokio::test]
    async fn test_version_mismatch_keeps_state_but_records_interaction() {
        let mut h = Harness::with_blobs(
            returning_french_learner(),
            vec![
                Ok(json!({"intention": "continue_previous"})),
                five_sentences(),
                graded("0.9", 0.95),
            ],
        );
        h.tutor.start();
        h.tutor.handle_input("continue").await;
        h.tutor.handle_input("Bonjour").await;

        let learner = h.tutor.learner_state();
        assert_eq!(learner.language_proficiency["french"].level, 0.1);
        assert_eq!(learner.current_lesson_data.interactions.len(), 1);
        assert_eq!(
            learner.current_lesson_data.interactions[0].user_translation,
            "Bonjour"
        );
        assert_eq!(h.tutor.state(), TutorState::GradeTranslation);
        assert!(h.said().last().unwrap().contains("\"s2\""));
        // Scratch data is persisted while the session runs
        assert_eq!(h.stored().current_lesson_data.interactions.len(), 1);
    }

    fn graded_with(proficiency: Value) -> Result<Value, TutorError> {
        Ok(json!({
            "your_corrections": "Almost.",
            "your_advice": "Check the verb ending.",
            "updated_user_state": {
                "version": "1.1",
                "language_proficiency": {"french": proficiency}
            }
        }))
    }

    #[tokio::test]
    async fn test_partial_progress_report_keeps_earlier_progress() {
        let mut h = Harness::with_blobs(
            returning_french_learner(),
            vec![
                Ok(json!({"intention": "continue_previous"})),
                five_sentences(),
                graded_with(json!({
                    "level": 0.4,
                    "strengths": ["greetings"],
                    "weaknesses": ["gender"],
                    "correct_streak_session": 2
                })),
                graded_with(json!({"weaknesses": ["gender", "verb endings"], "strengths": 12})),
            ],
        );
        h.tutor.start();
        h.tutor.handle_input("continue").await;
        h.tutor.handle_input("Bonjour").await;
        h.tutor.handle_input("Je mange").await;

        assert_eq!(h.tutor.learner_state().current_lesson_data.interactions.len(), 2);
        let french = &h.stored().language_proficiency["french"];
        assert_eq!(french.level, 0.4);
        assert_eq!(french.strengths, vec!["greetings"]);
        assert_eq!(french.correct_streak_session, 2);
        assert_eq!(french.weaknesses, vec!["gender", "verb endings"]);
    }

    #[tokio::test]
    async fn test_grading_failure_skips_sentence() {
        let mut h = Harness::with_blobs(
            returning_french_learner(),
            vec![
                Ok(json!({"intention": "continue_previous"})),
                five_sentences(),
                Ok(json!({"your_advice": "no corrections given"})),
            ],
        );
        h.tutor.start();
        h.tutor.handle_input("continue").await;
        h.tutor.handle_input("Bonjour").await;

        assert!(h.tutor.learner_state().current_lesson_data.interactions.is_empty());
        assert_eq!(h.tutor.state(), TutorState::GradeTranslation);
        let said = h.said();
        assert!(said.contains(&messages::ERROR_RESPONSE.to_string()));
        assert!(said.last().unwrap().contains("\"s2\""));
    }

    #[tokio::test]
    async fn test_full_lesson_records_one_history_entry() {
        let mut replies = vec![Ok(json!({"intention": "continue_previous"})), five_sentences()];
        for i in 1..=5 {
            replies.push(graded("1.1", 0.1 + i as f64 * 0.05));
        }
        replies.push(summary());

        let mut h = Harness::with_blobs(returning_french_learner(), replies);
        h.tutor.start();
        h.tutor.handle_input("continue").await;
        for i in 0..5 {
            h.tutor.handle_input(&format!("translation {}", i)).await;
        }

        assert_eq!(h.tutor.state(), TutorState::Exit);
        assert!(!h.tutor.is_active());

        let stored = h.stored();
        assert_eq!(stored.lesson_history_summary.len(), 1);
        let record = &stored.lesson_history_summary[0];
        assert_eq!(record.key_takeaway, "Solid work on greetings.");
        assert_eq!(record.exercise_count, 5);
        assert_eq!(record.lang_pair, "english-french");
        assert!(stored.current_lesson_data.is_empty());
        assert!((stored.language_proficiency["french"].level - 0.35).abs() < 1e-9);
        assert!(stored.language_proficiency["french"].last_practiced_utc.is_some());
        assert_eq!(stored.learning_focus["french"], vec!["past tense"]);

        let trace = h.tutor.trace();
        assert_eq!(trace.iter().filter(|s| **s == TutorState::Conclude).count(), 1);
        assert_eq!(trace.last(), Some(&TutorState::Exit));
    }

    #[tokio::test]
    async fn test_summary_failure_records_generic_entry() {
        let mut replies = vec![
            Ok(json!({"intention": "continue_previous"})),
            Ok(json!({"sentences": ["only one"]})),
            graded("1.1", 0.2),
        ];
        replies.push(Ok(json!({"lesson_summary_text": "no motivation"})));

        let mut h = Harness::with_blobs(returning_french_learner(), replies);
        h.tutor.start();
        h.tutor.handle_input("continue").await;
        h.tutor.handle_input("Bonjour").await;

        let stored = h.stored();
        assert_eq!(stored.lesson_history_summary.len(), 1);
        assert_eq!(
            stored.lesson_history_summary[0].key_takeaway,
            messages::HISTORY_ERROR_TAKEAWAY
        );
        assert!(stored.current_lesson_data.is_empty());
        assert!(!h.tutor.is_active());
    }

    #[tokio::test]
    async fn test_exit_clears_scratch() {
        let mut h = Harness::with_blobs(
            returning_french_learner(),
            vec![Ok(json!({"intention": "continue_previous"})), five_sentences()],
        );
        h.tutor.start();
        h.tutor.handle_input("continue").await;
        assert!(!h.stored().current_lesson_data.is_empty());
        assert_eq!(h.tutor.study_label(), "Continue french");

        h.tutor.exit();
        assert!(!h.tutor.is_active());
        assert!(h.tutor.config().is_none());
        assert!(h.tutor.learner_state().current_lesson_data.is_empty());
        assert!(h.stored().current_lesson_data.is_empty());
        assert_eq!(h.tutor.study_label(), "Continue french");

        // Input after exit is ignored
        h.tutor.handle_input("anything").await;
        assert_eq!(h.model.calls(), 2);
    }

    #[tokio::test]
    async fn test_reset_progress_forgets_everything() {
        let mut h = Harness::with_blobs(returning_french_learner(), vec![]);
        h.tutor.start();
        h.tutor.reset_progress().unwrap();

        assert!(!h.tutor.is_active());
        assert_eq!(h.tutor.study_label(), messages::START_STUDY);
        assert!(h.tutor.learner_state().previous_triple().is_none());
        assert!(!h.blobs.contains(LEARNER_STATE_BLOB));
    }

    #[test]
    fn test_clarified_config_requires_known_language() {
        assert!(clarified_config("german", "english", "english", "german").is_some());
        assert!(clarified_config("german", "english", "german", "english").is_some());
        assert!(clarified_config("german", "english", "german", "spanish").is_none());
        assert!(clarified_config("german", "english", "german", "german").is_none());
    }

    #[tokio::test]
    async fn test_input_between_steps_is_ignored() {
        let mut h = Harness::new(vec![five_sentences()]);
        h.tutor.start();
        h.tutor.state = TutorState::PrepareLesson;

        h.tutor.handle_input("spanish please").await;
        assert_eq!(h.model.calls(), 0);
        assert_eq!(h.tutor.state(), TutorState::PrepareLesson);
        assert!(h.tutor.is_active());
    }

    #[test]
    fn test_awaiting_states() {
        assert!(TutorState::GradeTranslation.awaits_input());
        assert!(!TutorState::PrepareLesson.awaits_input());
        assert!(!TutorState::Exit.awaits_input());
    }
}
