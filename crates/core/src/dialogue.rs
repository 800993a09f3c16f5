//! The turn-taking session engine.
//!
//! A session is a bounded loop over [`Phase`]: the tutor opens, then learner and tutor
//! alternate until a trigger phrase, the turn limit or the learner's cancel signal ends
//! the cycle. Every session that gets past its opening turn is finalized into a new
//! progress record.

use crate::{
    annotation::AnnotatedText,
    language::LanguageProfile,
    level::{LEVEL_TRIGGER, LevelParseError, ProficiencyLevel, contains_trigger, extract_level},
    llm_client::{ChatClient, Message, Role},
    narrative::NarrativeUpdater,
    progress::{NarrativeFields, ProgressError, ProgressRecord, ProgressStore},
    prompts::{Prompts, render},
    speech::{
        LearnerInput, LearnerSignal, RECOGNITION_ERROR, SessionObserver, SpeechRecognizer,
        SpeechSynthesizer,
    },
    topic::TopicService,
    voice::speak_with_fallback,
};
use std::{fmt, sync::Arc};
use tracing::{Instrument, debug, info, info_span, warn};

/// Opening plus seven follow-ups.
pub const DIAGNOSTIC_MAX_TUTOR_TURNS: usize = 8;
/// Opening plus forty-eight follow-ups.
pub const LESSON_MAX_TUTOR_TURNS: usize = 49;
/// Said by the tutor when a lesson is over. Matched as a case-insensitive substring.
pub const LESSON_COMPLETE_TRIGGER: &str = "lesson is complete";

const NOT_AVAILABLE: &str = "Not available";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not determine proficiency level: {0}")]
    Level(#[from] LevelParseError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error("tutor did not respond: {0:#}")]
    Chat(anyhow::Error),
}

/// Which kind of session to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Diagnostic,
    Lesson(ProficiencyLevel),
}

impl SessionKind {
    pub fn max_tutor_turns(self) -> usize {
        match self {
            SessionKind::Diagnostic => DIAGNOSTIC_MAX_TUTOR_TURNS,
            SessionKind::Lesson(_) => LESSON_MAX_TUTOR_TURNS,
        }
    }

    /// Phrase that ends the turn cycle when it appears in a follow-up tutor turn.
    pub fn trigger(self) -> &'static str {
        match self {
            SessionKind::Diagnostic => LEVEL_TRIGGER,
            SessionKind::Lesson(_) => LESSON_COMPLETE_TRIGGER,
        }
    }

    fn exit_phase(self) -> Phase {
        match self {
            SessionKind::Diagnostic => Phase::LevelParsed,
            SessionKind::Lesson(level) => Phase::Finalized(level),
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Diagnostic => write!(f, "diagnostic"),
            SessionKind::Lesson(level) => write!(f, "lesson level {level}"),
        }
    }
}

/// States of the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    TopicSelection(ProficiencyLevel),
    AwaitTutorOpening,
    AwaitLearnerTurn,
    AwaitTutorTurn,
    LevelParsed,
    Finalized(ProficiencyLevel),
}

/// Why the turn cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    TriggerPhrase,
    TurnLimit,
    Cancelled,
    /// The chat service failed on a follow-up turn.
    ChatFailure,
}

/// The result of a finalized session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub level: ProficiencyLevel,
    pub record: ProgressRecord,
    pub tutor_turns: usize,
    pub end: SessionEnd,
    /// Lesson topic; `None` for diagnostics.
    pub topic: Option<String>,
}

/// Transient state of one session. Dropped when the session ends.
#[derive(Debug)]
struct Session {
    learner: String,
    language: LanguageProfile,
    system_prompt: String,
    history: Vec<Message>,
    topic: Option<String>,
}

impl Session {
    fn new(learner: &str, language: &LanguageProfile) -> Self {
        Self {
            learner: learner.to_string(),
            language: language.clone(),
            system_prompt: String::new(),
            history: Vec::new(),
            topic: None,
        }
    }

    fn last_tutor_text(&self) -> &str {
        self.history
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map_or("", |message| message.content.as_str())
    }
}

/// Counts tutor turns against the session's limit.
#[derive(Debug)]
struct TurnCycle {
    taken: usize,
    max: usize,
}

impl TurnCycle {
    fn new(max: usize) -> Self {
        Self { taken: 0, max }
    }

    fn advance(&mut self) -> usize {
        self.taken += 1;
        self.taken
    }

    fn exhausted(&self) -> bool {
        self.taken >= self.max
    }
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionServices {
    pub chat: Arc<dyn ChatClient>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub learner: Arc<dyn LearnerInput>,
    pub topics: Arc<dyn TopicService>,
    pub observer: Arc<dyn SessionObserver>,
    pub store: ProgressStore,
    pub prompts: Arc<Prompts>,
}

pub struct DialogueOrchestrator {
    services: SessionServices,
    narratives: NarrativeUpdater,
}

impl DialogueOrchestrator {
    pub fn new(services: SessionServices) -> Self {
        let narratives = NarrativeUpdater::new(services.chat.clone(), services.prompts.clone());
        Self {
            services,
            narratives,
        }
    }

    /// Runs a placement test and records the level the evaluator assigns.
    pub async fn run_diagnostic(
        &self,
        learner: &str,
        language: &LanguageProfile,
    ) -> Result<SessionOutcome, SessionError> {
        self.run(learner, language, SessionKind::Diagnostic).await
    }

    /// Runs a lesson at a known level.
    pub async fn run_lesson(
        &self,
        learner: &str,
        language: &LanguageProfile,
        level: ProficiencyLevel,
    ) -> Result<SessionOutcome, SessionError> {
        self.run(learner, language, SessionKind::Lesson(level)).await
    }

    pub async fn run(
        &self,
        learner: &str,
        language: &LanguageProfile,
        kind: SessionKind,
    ) -> Result<SessionOutcome, SessionError> {
        let span = info_span!("session", learner, language = %language.code, mode = %kind);
        self.drive(learner, language, kind).instrument(span).await
    }

    async fn drive(
        &self,
        learner: &str,
        language: &LanguageProfile,
        kind: SessionKind,
    ) -> Result<SessionOutcome, SessionError> {
        let previous = self.services.store.read_latest(learner)?;
        let mut session = Session::new(learner, language);
        let mut cycle = TurnCycle::new(kind.max_tutor_turns());
        let mut end = SessionEnd::TurnLimit;
        let mut phase = Phase::Start;

        info!(has_previous = previous.is_some(), "Session started");
        loop {
            debug!(?phase, turns = cycle.taken, "Advancing session");
            phase = match phase {
                Phase::Start => match kind {
                    SessionKind::Diagnostic => {
                        session.system_prompt = render(
                            &self.services.prompts.evaluator_system,
                            &[("language", language.display_name)],
                        );
                        Phase::AwaitTutorOpening
                    }
                    SessionKind::Lesson(level) => Phase::TopicSelection(level),
                },
                Phase::TopicSelection(level) => {
                    let choice = self.services.topics.choose_topic(language, level).await;
                    let observer = &self.services.observer;
                    observer.inspiration_words(&choice.inspiration);
                    if !choice.reasoning.is_empty() {
                        observer.topic_reasoning(&choice.reasoning);
                    }
                    observer.topic_selected(&choice.topic);

                    session.system_prompt = lesson_instructions(
                        &self.services.prompts,
                        language,
                        level,
                        &choice.topic,
                        previous.as_ref(),
                    );
                    session.topic = Some(choice.topic);
                    Phase::AwaitTutorOpening
                }
                Phase::AwaitTutorOpening => {
                    let opening = self.opening_message(&session, kind);
                    session.history.push(Message::user(opening));
                    self.tutor_turn(&mut session, &mut cycle)
                        .await
                        .map_err(SessionError::Chat)?;
                    if cycle.exhausted() {
                        kind.exit_phase()
                    } else {
                        Phase::AwaitLearnerTurn
                    }
                }
                Phase::AwaitLearnerTurn => match self.learner_turn(&mut session).await {
                    LearnerSignal::Ready => Phase::AwaitTutorTurn,
                    LearnerSignal::Cancel => {
                        info!(turns = cycle.taken, "Session cancelled by learner");
                        self.services.observer.session_cancelled();
                        end = SessionEnd::Cancelled;
                        kind.exit_phase()
                    }
                },
                Phase::AwaitTutorTurn => match self.tutor_turn(&mut session, &mut cycle).await {
                    Ok(text) if contains_trigger(&text, kind.trigger()) => {
                        info!(turns = cycle.taken, trigger = kind.trigger(), "Trigger phrase detected");
                        end = SessionEnd::TriggerPhrase;
                        kind.exit_phase()
                    }
                    Ok(_) if cycle.exhausted() => {
                        info!(turns = cycle.taken, "Turn limit reached");
                        end = SessionEnd::TurnLimit;
                        kind.exit_phase()
                    }
                    Ok(_) => Phase::AwaitLearnerTurn,
                    Err(e) => {
                        warn!(error = ?e, "Chat request failed, ending session");
                        end = SessionEnd::ChatFailure;
                        kind.exit_phase()
                    }
                },
                Phase::LevelParsed => {
                    let level = extract_level(session.last_tutor_text())?;
                    info!(%level, "Proficiency level assigned");
                    Phase::Finalized(level)
                }
                Phase::Finalized(level) => {
                    let summary = match &session.topic {
                        Some(topic) => {
                            format!("Completed a level {level} lesson on the topic of {topic}")
                        }
                        None => format!(
                            "Diagnostic test completed. Assigned proficiency level: {level}/10"
                        ),
                    };
                    let record = self
                        .finalize(&session, previous.as_ref(), level, &summary)
                        .await?;
                    return Ok(SessionOutcome {
                        level,
                        record,
                        tutor_turns: cycle.taken,
                        end,
                        topic: session.topic,
                    });
                }
            };
        }
    }

    fn opening_message(&self, session: &Session, kind: SessionKind) -> String {
        let prompts = &self.services.prompts;
        let language = session.language.display_name;
        match (kind, &session.topic) {
            (SessionKind::Lesson(level), Some(topic)) => render(
                &prompts.lesson_opening,
                &[
                    ("language", language),
                    ("level", &level.to_string()),
                    ("topic", topic),
                ],
            ),
            _ => render(&prompts.diagnostic_opening, &[("language", language)]),
        }
    }

    /// Requests the next tutor utterance, shows it, speaks it and appends it to history.
    async fn tutor_turn(&self, session: &mut Session, cycle: &mut TurnCycle) -> anyhow::Result<String> {
        let text = self
            .services
            .chat
            .complete(&session.system_prompt, &session.history)
            .await?;
        let turn = cycle.advance();
        let split = AnnotatedText::split(&text);
        info!(turn, chars = text.len(), annotations = split.annotations().count(), "Tutor turn");

        self.services.observer.tutor_turn(turn, &split);
        if split.is_silent() {
            debug!(turn, "Nothing to speak after removing annotations");
        } else {
            let synthesizer = self.services.synthesizer.as_ref();
            let candidates = synthesizer.candidates(&session.language);
            speak_with_fallback(synthesizer, &candidates, &split.spoken, &session.language).await;
        }

        session.history.push(Message::assistant(text.clone()));
        Ok(text)
    }

    /// Waits for the learner, records and transcribes them. Sentinel transcripts are
    /// appended like any other reply.
    async fn learner_turn(&self, session: &mut Session) -> LearnerSignal {
        let learner = &self.services.learner;
        if learner.await_ready().await == LearnerSignal::Cancel {
            return LearnerSignal::Cancel;
        }

        let transcript = match learner.capture().await {
            Ok(audio) => {
                debug!(seconds = audio.duration_secs(), "Captured learner audio");
                self.services
                    .recognizer
                    .transcribe(&audio, session.language.recognizer_locale)
                    .await
            }
            Err(e) => {
                warn!(error = ?e, "Audio capture failed");
                RECOGNITION_ERROR.to_string()
            }
        };
        info!(chars = transcript.len(), "Learner turn");
        self.services.observer.learner_turn(&transcript);
        session.history.push(Message::user(transcript));
        LearnerSignal::Ready
    }

    async fn finalize(
        &self,
        session: &Session,
        previous: Option<&ProgressRecord>,
        level: ProficiencyLevel,
        summary: &str,
    ) -> Result<ProgressRecord, ProgressError> {
        self.services.observer.finalizing();
        let narrative = match self
            .narratives
            .request(previous, &session.language, level, summary)
            .await
        {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = ?e, "Progress update request failed, keeping previous narrative");
                NarrativeFields::default()
            }
        };
        self.services
            .store
            .write(&session.learner, &session.language, level, summary, narrative)
    }
}

/// Tutoring policy for a lesson, followed by the learner's narrative when one exists.
fn lesson_instructions(
    prompts: &Prompts,
    language: &LanguageProfile,
    level: ProficiencyLevel,
    topic: &str,
    previous: Option<&ProgressRecord>,
) -> String {
    let mut instructions = render(
        &prompts.tutor_policy,
        &[
            ("language", language.display_name),
            ("level", &level.to_string()),
            ("topic", topic),
        ],
    );
    if let Some(previous) = previous {
        let narrative = &previous.narrative;
        for (label, value) in [
            ("overall progress", &narrative.overall_progress),
            ("language goals", &narrative.language_goals),
            ("proximal zone of development", &narrative.proximal_development),
        ] {
            let value = match value.trim() {
                "" => NOT_AVAILABLE,
                value => value,
            };
            instructions.push_str(&format!("\nUser's {label}: {value}"));
        }
    }
    instructions
}
