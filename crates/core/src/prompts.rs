//! Instruction templates sent to the chat service.
//!
//! Every template can be replaced by a Markdown file named after its key
//! (e.g. `tutor_policy.md`) in a prompts directory. Placeholders use `{name}` syntax.

use anyhow::{Context, Result, bail};
use std::{fs, path::Path};
use tracing::info;

const EVALUATOR_SYSTEM: &str = "You are a language proficiency evaluator for {language}.
Conduct a verbal diagnostic test with 3 questions of increasing difficulty to assess the user's proficiency.
After the test, provide a summary and assign a proficiency level from 1 to 10, where 1 is beginner and 10 is native-like fluency. State the result as \"proficiency level N\".
Speak in the target language, but provide translations in [square brackets] for beginners if they struggle.";

const DIAGNOSTIC_OPENING: &str = "Please start the {language} proficiency test.";

const TUTOR_POLICY: &str = "You are a concise language tutor for {language} at proficiency level {level}/10.
Create an interactive spoken-language lesson on the topic of {topic}. Possible activities include:
1. Key vocabulary words or phrases
2. Short reading passage or dialogue
3. Comprehension questions
4. Role-playing scenarios
5. Other creative exercises
Keep your responses brief (1-2 sentences max) to maximize student speaking time. Correct any grammar mistakes succinctly and don't overly praise the student's response. Adjust complexity based on proficiency level.

Your words will be read aloud by a system that expects you to speak in the target language, so always speak in the target language, unless using [square brackets], which are not read aloud. [square brackets] can be used for:
- Translations for each sentence (only levels 1-2) or individual words/phrases (levels 3-6) as appropriate to the level
- Pronunciation in cases where the user might not know the pronunciation (or appear to be having trouble pronouncing the word), especially at earlier levels.

Lessons for languages with non-Roman alphabets should be more basic and more heavily annotated (with multiple translations, pronunciations, and hints) at the early levels than for other languages.

Be highly interactive and encourage student output. Focus on sentence structure, grammar, and vocabulary rather than minor pronunciation or punctuation issues. If a user can't get the pronunciation right after 1-2 tries, just move on. (Also take into account that the student's response is being transcribed by a good but imperfect STT system) Don't use asterisks in your responses.
When the lesson has run its course, say goodbye and end your final message with the exact phrase \"Lesson is complete!\".";

const LESSON_OPENING: &str =
    "Please start a {language} lesson at level {level} on the topic of {topic}.";

const TOPIC_SYSTEM: &str = "You are a creative topic generator for language learning lessons.";

const TOPIC_REQUEST: &str = "As a language learning expert, your task is to generate an interesting and level-appropriate topic for a {language} lesson.

Current language level: {level}/10
Inspiration words: {word1}, {word2}

Please follow these steps and show your full chain of thought:
1. Consider the two given inspiration words: {word1} and {word2}.
2. Use these words as inspiration to create a unique, engaging topic that's suitable for the student's current language level.
3. Ensure the topic is 2-5 words long and appropriate for a language learning context.
4. Explain your reasoning for choosing this topic and how it relates to the language level.

At the end of your response, please clearly state the final topic by prefixing it with \"FINAL TOPIC:\".";

const PROGRESS_SYSTEM: &str = "You are an AI language learning assistant. Your task is to provide a detailed update on the user's overall progress and language goals based on their previous progress and recent lesson summary. Focus on the user's proximal zone of development to inform future lessons efficiently.";

const PROGRESS_REQUEST: &str = "Based on the user's previous progress and the recent lesson summary, provide an updated overall progress and language goals for the user. Focus on the proximal zone of development to suggest the most efficient ways to improve.

Previous overall progress: {previous_progress}
Previous language goals: {previous_goals}

Recent lesson summary: {summary}

Current language: {language}
Current level: {level}/10

Please provide your response in the following XML format:
<overall_progress>
A few paragraphs detailing the user's overall progress, including strengths, areas for improvement, and how they've advanced since the last update.
</overall_progress>

<language_goals>
A few paragraphs outlining specific language goals tailored to the user's current level and proximal zone of development. Include suggestions for the most efficient ways to achieve these goals.
</language_goals>

<proximal_development>
A paragraph discussing the user's proximal zone of development and recommendations for future lessons to maximize learning efficiency.
</proximal_development>";

/// The full set of templates used by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub evaluator_system: String,
    pub diagnostic_opening: String,
    pub tutor_policy: String,
    pub lesson_opening: String,
    pub topic_system: String,
    pub topic_request: String,
    pub progress_system: String,
    pub progress_request: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            evaluator_system: EVALUATOR_SYSTEM.to_string(),
            diagnostic_opening: DIAGNOSTIC_OPENING.to_string(),
            tutor_policy: TUTOR_POLICY.to_string(),
            lesson_opening: LESSON_OPENING.to_string(),
            topic_system: TOPIC_SYSTEM.to_string(),
            topic_request: TOPIC_REQUEST.to_string(),
            progress_system: PROGRESS_SYSTEM.to_string(),
            progress_request: PROGRESS_REQUEST.to_string(),
        }
    }
}

impl Prompts {
    /// Starts from the built-in templates and replaces any that have a matching
    /// `<key>.md` file in `dir`. Unknown Markdown files are rejected so a typo in a
    /// file name does not silently fall back to the default.
    pub fn with_overrides(dir: &Path) -> Result<Self> {
        let mut prompts = Self::default();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Could not read prompts directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            let Some(slot) = prompts.slot_mut(&key) else {
                bail!("Unknown prompt template '{}' in {}", key, dir.display());
            };
            *slot = content.trim_end().to_string();
            info!(prompt = %key, "Loaded prompt override");
        }
        Ok(prompts)
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut String> {
        Some(match key {
            "evaluator_system" => &mut self.evaluator_system,
            "diagnostic_opening" => &mut self.diagnostic_opening,
            "tutor_policy" => &mut self.tutor_policy,
            "lesson_opening" => &mut self.lesson_opening,
            "topic_system" => &mut self.topic_system,
            "topic_request" => &mut self.topic_request,
            "progress_system" => &mut self.progress_system,
            "progress_request" => &mut self.progress_request,
            _ => return None,
        })
    }
}

/// Substitutes `{name}` placeholders. Unknown placeholders are left untouched.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_replaces_every_occurrence() {
        let text = render(
            "{word1} and {word2}; again {word1}. {untouched}",
            &[("word1", "river"), ("word2", "lamp")],
        );
        assert_eq!(text, "river and lamp; again river. {untouched}");
    }

    #[test]
    fn test_default_templates_mention_their_placeholders() {
        let prompts = Prompts::default();
        assert!(prompts.tutor_policy.contains("{topic}"));
        assert!(prompts.tutor_policy.contains("Lesson is complete!"));
        assert!(prompts.topic_request.contains("FINAL TOPIC:"));
        assert!(prompts.progress_request.contains("<proximal_development>"));
        assert!(prompts.evaluator_system.contains("proficiency level"));
    }

    #[test]
    fn test_overrides_replace_matching_templates() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("topic_system.md"), "Pick something fun.\n").unwrap();
        fs::write(tmp.path().join("notes.txt"), "not a prompt").unwrap();

        let prompts = Prompts::with_overrides(tmp.path()).unwrap();
        assert_eq!(prompts.topic_system, "Pick something fun.");
        assert_eq!(prompts.tutor_policy, Prompts::default().tutor_policy);
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("tutor_polcy.md"), "typo").unwrap();
        let err = Prompts::with_overrides(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("tutor_polcy"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(Prompts::with_overrides(Path::new("/definitely/not/here")).is_err());
    }
}
