//! Lesson topic selection.
//!
//! Two random words from a word list are handed to the chat service as inspiration,
//! and the model is asked to reason aloud before committing to a topic on a line
//! prefixed with `FINAL TOPIC:`.

use crate::{
    language::LanguageProfile,
    level::ProficiencyLevel,
    llm_client::{ChatClient, Message},
    prompts::{Prompts, render},
};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use regex::Regex;
use std::{
    fs,
    path::PathBuf,
    sync::{Arc, LazyLock},
};
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

/// Topic used whenever the chat service cannot provide one.
pub const DEFAULT_TOPIC: &str = "Daily routines";
/// Word returned when the word list is unusable.
pub const FALLBACK_WORD: &str = "default";

static FINAL_TOPIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FINAL TOPIC:\s*(.+)").expect("static topic pattern is valid"));

/// Source of inspiration words.
#[cfg_attr(test, automock)]
pub trait WordSource: Send + Sync {
    /// A single lowercase word. Never fails; see [`FALLBACK_WORD`].
    fn random_word(&self) -> String;
}

/// Picks words from a newline-separated dictionary file such as `/usr/share/dict/words`.
pub struct DictionaryWordSource {
    path: PathBuf,
}

impl DictionaryWordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WordSource for DictionaryWordSource {
    fn random_word(&self) -> String {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read word list");
                return FALLBACK_WORD.to_string();
            }
        };
        let words: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        match words.choose(&mut rand::rng()) {
            Some(word) => word.to_lowercase(),
            None => {
                warn!(path = %self.path.display(), "Word list is empty");
                FALLBACK_WORD.to_string()
            }
        }
    }
}

/// The outcome of topic selection, including what the learner is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicChoice {
    pub topic: String,
    pub inspiration: [String; 2],
    /// The model's full response, chain of thought included. Empty on fallback.
    pub reasoning: String,
    /// True when [`DEFAULT_TOPIC`] was used.
    pub fallback: bool,
}

/// Chooses the topic of a lesson.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TopicService: Send + Sync {
    /// Always returns a topic; failures fall back to [`DEFAULT_TOPIC`].
    async fn choose_topic(&self, language: &LanguageProfile, level: ProficiencyLevel) -> TopicChoice;
}

/// A `TopicService` backed by the chat service and a word source.
pub struct LLMTopicService {
    chat: Arc<dyn ChatClient>,
    words: Arc<dyn WordSource>,
    prompts: Arc<Prompts>,
}

impl LLMTopicService {
    pub fn new(chat: Arc<dyn ChatClient>, words: Arc<dyn WordSource>, prompts: Arc<Prompts>) -> Self {
        Self {
            chat,
            words,
            prompts,
        }
    }
}

#[async_trait]
impl TopicService for LLMTopicService {
    async fn choose_topic(&self, language: &LanguageProfile, level: ProficiencyLevel) -> TopicChoice {
        let inspiration = [self.words.random_word(), self.words.random_word()];
        debug!(word1 = %inspiration[0], word2 = %inspiration[1], "Drew inspiration words");

        let level_text = level.to_string();
        let request = render(
            &self.prompts.topic_request,
            &[
                ("language", language.display_name),
                ("level", &level_text),
                ("word1", &inspiration[0]),
                ("word2", &inspiration[1]),
            ],
        );

        let reasoning = match self
            .chat
            .complete(&self.prompts.topic_system, &[Message::user(request)])
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = ?e, "Topic generation failed, using default topic");
                return TopicChoice {
                    topic: DEFAULT_TOPIC.to_string(),
                    inspiration,
                    reasoning: String::new(),
                    fallback: true,
                };
            }
        };

        match extract_final_topic(&reasoning) {
            Some(topic) => {
                info!(%topic, "Topic selected");
                TopicChoice {
                    topic,
                    inspiration,
                    reasoning,
                    fallback: false,
                }
            }
            None => {
                warn!("Topic response had no FINAL TOPIC line, using default topic");
                TopicChoice {
                    topic: DEFAULT_TOPIC.to_string(),
                    inspiration,
                    reasoning,
                    fallback: true,
                }
            }
        }
    }
}

/// Reads the text following the first `FINAL TOPIC:` marker, up to the end of that line.
pub fn extract_final_topic(text: &str) -> Option<String> {
    let caps = FINAL_TOPIC.captures(text)?;
    let topic = caps
        .get(1)?
        .as_str()
        .trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '\'' || c.is_whitespace())
        .to_string();
    (!topic.is_empty()).then_some(topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockChatClient;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn level(n: i64) -> ProficiencyLevel {
        ProficiencyLevel::new(n).unwrap()
    }

    fn fixed_words(first: &'static str, second: &'static str) -> MockWordSource {
        let mut words = MockWordSource::new();
        let mut seq = mockall::Sequence::new();
        words
            .expect_random_word()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || first.to_string());
        words
            .expect_random_word()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || second.to_string());
        words
    }

    #[test]
    fn test_extract_final_topic() {
        let text = "The words suggest travel.\nFINAL TOPIC: **\"Lost luggage at the airport\"**\nThanks";
        assert_eq!(
            extract_final_topic(text).as_deref(),
            Some("Lost luggage at the airport")
        );
        assert_eq!(extract_final_topic("No marker here"), None);
        assert_eq!(extract_final_topic("FINAL TOPIC: **"), None);
    }

    #[test]
    fn test_dictionary_word_source_reads_lowercase_words() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Harbor\n\nHARBOR\nharbor").unwrap();
        let source = DictionaryWordSource::new(file.path());
        for _ in 0..5 {
            assert_eq!(source.random_word(), "harbor");
        }
    }

    #[test]
    fn test_dictionary_word_source_falls_back() {
        let missing = DictionaryWordSource::new("/no/such/words/file");
        assert_eq!(missing.random_word(), FALLBACK_WORD);

        let empty = NamedTempFile::new().unwrap();
        assert_eq!(DictionaryWordSource::new(empty.path()).random_word(), FALLBACK_WORD);
    }

    #[tokio::test]
    async fn test_choose_topic_uses_inspiration_words() {
        let mut chat = MockChatClient::new();
        chat.expect_complete()
            .withf(|system, history| {
                system.contains("creative topic generator")
                    && history[0].content.contains("Inspiration words: kettle, mountain")
                    && history[0].content.contains("Current language level: 3/10")
                    && history[0].content.contains("for a German lesson")
            })
            .times(1)
            .returning(|_, _| {
                Ok("Kettles and mountains evoke hiking.\nFINAL TOPIC: Tea on a hike".to_string())
            });

        let service = LLMTopicService::new(
            Arc::new(chat),
            Arc::new(fixed_words("kettle", "mountain")),
            Arc::new(Prompts::default()),
        );
        let choice = service
            .choose_topic(&LanguageProfile::lookup("de"), level(3))
            .await;
        assert_eq!(choice.topic, "Tea on a hike");
        assert_eq!(choice.inspiration, ["kettle".to_string(), "mountain".to_string()]);
        assert!(choice.reasoning.contains("evoke hiking"));
        assert!(!choice.fallback);
    }

    #[tokio::test]
    async fn test_choose_topic_falls_back_on_chat_error() {
        let mut chat = MockChatClient::new();
        chat.expect_complete()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));
        let service = LLMTopicService::new(
            Arc::new(chat),
            Arc::new(fixed_words("a", "b")),
            Arc::new(Prompts::default()),
        );
        let choice = service.choose_topic(&LanguageProfile::lookup("es"), level(5)).await;
        assert_eq!(choice.topic, DEFAULT_TOPIC);
        assert!(choice.fallback);
        assert!(choice.reasoning.is_empty());
    }

    #[tokio::test]
    async fn test_choose_topic_falls_back_without_marker() {
        let mut chat = MockChatClient::new();
        chat.expect_complete()
            .returning(|_, _| Ok("I could not decide.".to_string()));
        let service = LLMTopicService::new(
            Arc::new(chat),
            Arc::new(fixed_words("a", "b")),
            Arc::new(Prompts::default()),
        );
        let choice = service.choose_topic(&LanguageProfile::lookup("es"), level(5)).await;
        assert_eq!(choice.topic, DEFAULT_TOPIC);
        assert_eq!(choice.reasoning, "I could not decide.");
        assert!(choice.fallback);
    }
}
