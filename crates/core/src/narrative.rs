//! Fresh progress narratives from the chat service.

use crate::{
    language::LanguageProfile,
    level::ProficiencyLevel,
    llm_client::{ChatClient, Message},
    progress::{NarrativeFields, ProgressRecord},
    prompts::{Prompts, render},
};
use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

static OVERALL_PROGRESS: LazyLock<Regex> = LazyLock::new(|| tag_pattern("overall_progress"));
static LANGUAGE_GOALS: LazyLock<Regex> = LazyLock::new(|| tag_pattern("language_goals"));
static PROXIMAL_DEVELOPMENT: LazyLock<Regex> =
    LazyLock::new(|| tag_pattern("proximal_development"));

fn tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")).expect("static tag pattern is valid")
}

fn capture(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Reads the three tagged sections; a missing section comes back empty.
pub fn parse_narrative(text: &str) -> NarrativeFields {
    NarrativeFields {
        overall_progress: capture(&OVERALL_PROGRESS, text),
        language_goals: capture(&LANGUAGE_GOALS, text),
        proximal_development: capture(&PROXIMAL_DEVELOPMENT, text),
    }
}

/// Asks the chat service to update a learner's narrative after a session.
pub struct NarrativeUpdater {
    chat: Arc<dyn ChatClient>,
    prompts: Arc<Prompts>,
}

impl NarrativeUpdater {
    pub fn new(chat: Arc<dyn ChatClient>, prompts: Arc<Prompts>) -> Self {
        Self { chat, prompts }
    }

    pub async fn request(
        &self,
        previous: Option<&ProgressRecord>,
        language: &LanguageProfile,
        level: ProficiencyLevel,
        lesson_summary: &str,
    ) -> Result<NarrativeFields> {
        let or_placeholder = |text: Option<&str>, placeholder: &'static str| -> String {
            match text {
                Some(text) if !text.trim().is_empty() => text.to_string(),
                _ => placeholder.to_string(),
            }
        };
        let previous_progress = or_placeholder(
            previous.map(|p| p.narrative.overall_progress.as_str()),
            "No previous progress recorded.",
        );
        let previous_goals = or_placeholder(
            previous.map(|p| p.narrative.language_goals.as_str()),
            "No previous goals recorded.",
        );
        let level = level.to_string();
        let request = render(
            &self.prompts.progress_request,
            &[
                ("previous_progress", &previous_progress),
                ("previous_goals", &previous_goals),
                ("summary", lesson_summary),
                ("language", language.display_name),
                ("level", &level),
            ],
        );

        let response = self
            .chat
            .complete(&self.prompts.progress_system, &[Message::user(request)])
            .await?;
        let fields = parse_narrative(&response);
        if fields.is_empty() {
            warn!("Progress update response contained no tagged sections");
        } else {
            debug!(
                overall_progress = fields.overall_progress.len(),
                language_goals = fields.language_goals.len(),
                proximal_development = fields.proximal_development.len(),
                "Parsed progress update"
            );
        }
        Ok(fields)
    }
}
