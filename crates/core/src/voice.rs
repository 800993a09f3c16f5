//! Voice fallback selection.
//!
//! Specific synthetic voices are not installed everywhere, so every language maps to an
//! ordered list of candidates that always ends with the engine's own default voice.

use crate::{
    language::LanguageProfile,
    speech::{SpeechSynthesizer, SynthesisError},
};
use std::fmt;
use tracing::{debug, info, warn};

/// A voice to try when speaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VoiceCandidate {
    /// A voice identifier understood by the synthesis engine.
    Named(String),
    /// Whatever the engine uses when no voice is requested.
    SystemDefault,
}

impl VoiceCandidate {
    pub fn name(&self) -> Option<&str> {
        match self {
            VoiceCandidate::Named(name) => Some(name),
            VoiceCandidate::SystemDefault => None,
        }
    }
}

impl fmt::Display for VoiceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceCandidate::Named(name) => write!(f, "{name}"),
            VoiceCandidate::SystemDefault => write!(f, "system default"),
        }
    }
}

pub struct VoiceFallbackSelector;

impl VoiceFallbackSelector {
    /// Candidates for a language, best first, ending in [`VoiceCandidate::SystemDefault`].
    pub fn select(language: &LanguageProfile) -> Vec<VoiceCandidate> {
        Self::from_names(language.voice_candidates.iter().copied())
    }

    /// Builds a candidate list from engine voice names, dropping blanks and repeats.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<VoiceCandidate> {
        let mut candidates: Vec<VoiceCandidate> = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty() || candidates.iter().any(|c| c.name() == Some(name)) {
                continue;
            }
            candidates.push(VoiceCandidate::Named(name.to_string()));
        }
        candidates.push(VoiceCandidate::SystemDefault);
        candidates
    }
}

/// Speaks `text` with the first candidate the synthesizer accepts.
///
/// Candidates are tried strictly in order. An unavailable voice moves on to the next
/// one; any other failure stops the attempt, since the engine itself is not working.
/// Returns the voice that was used, or `None` if nothing was spoken. Synthesis
/// problems never abort the turn.
pub async fn speak_with_fallback(
    synthesizer: &dyn SpeechSynthesizer,
    candidates: &[VoiceCandidate],
    text: &str,
    language: &LanguageProfile,
) -> Option<VoiceCandidate> {
    for candidate in candidates {
        debug!(voice = %candidate, "Attempting synthesis");
        match synthesizer.speak(text, language, candidate).await {
            Ok(()) => return Some(candidate.clone()),
            Err(SynthesisError::VoiceUnavailable(voice)) => {
                info!(%voice, "Voice not available. Trying next option.");
            }
            Err(SynthesisError::Failed(reason)) => {
                warn!(voice = %candidate, %reason, "Speech synthesis failed; continuing without audio");
                return None;
            }
        }
    }
    warn!(language = %language.code, "No suitable voice found");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::MockSpeechSynthesizer;
    use mockall::Sequence;

    fn named(name: &str) -> VoiceCandidate {
        VoiceCandidate::Named(name.to_string())
    }

    #[test]
    fn test_select_known_language() {
        let candidates = VoiceFallbackSelector::select(&LanguageProfile::lookup("fr"));
        assert_eq!(
            candidates,
            vec![
                named("Thomas"),
                named("Amelie"),
                named("Marie"),
                named("Daniel"),
                VoiceCandidate::SystemDefault
            ]
        );
    }

    #[test]
    fn test_select_unknown_language_still_ends_in_default() {
        let candidates = VoiceFallbackSelector::select(&LanguageProfile::lookup("xx"));
        assert_eq!(candidates, vec![named("Samantha"), VoiceCandidate::SystemDefault]);
    }

    #[test]
    fn test_from_names_dedups_and_skips_blanks() {
        let candidates = VoiceFallbackSelector::from_names(["es-419", "", "es", "es-419"]);
        assert_eq!(
            candidates,
            vec![named("es-419"), named("es"), VoiceCandidate::SystemDefault]
        );
        assert_eq!(
            VoiceFallbackSelector::from_names([]),
            vec![VoiceCandidate::SystemDefault]
        );
    }

    #[tokio::test]
    async fn test_fallback_attempts_candidates_in_order() {
        let mut synth = MockSpeechSynthesizer::new();
        let mut seq = Sequence::new();
        for unavailable in ["A", "B"] {
            synth
                .expect_speak()
                .withf(move |_, _, voice| voice.name() == Some(unavailable))
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_, _, _| Err(SynthesisError::VoiceUnavailable(unavailable.into())));
        }
        synth
            .expect_speak()
            .withf(|text, _, voice| text == "Hola" && voice.name() == Some("C"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let candidates = vec![named("A"), named("B"), named("C"), VoiceCandidate::SystemDefault];
        let used = speak_with_fallback(&synth, &candidates, "Hola", &LanguageProfile::lookup("es")).await;
        assert_eq!(used, Some(named("C")));
    }

    #[tokio::test]
    async fn test_fallback_reaches_system_default() {
        let mut synth = MockSpeechSynthesizer::new();
        synth
            .expect_speak()
            .withf(|_, _, voice| voice.name().is_some())
            .times(2)
            .returning(|_, _, voice| Err(SynthesisError::VoiceUnavailable(voice.to_string())));
        synth
            .expect_speak()
            .withf(|_, _, voice| *voice == VoiceCandidate::SystemDefault)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let language = LanguageProfile::lookup("xx");
        let candidates = vec![named("Ghost"), named("Phantom"), VoiceCandidate::SystemDefault];
        let used = speak_with_fallback(&synth, &candidates, "hello", &language).await;
        assert_eq!(used, Some(VoiceCandidate::SystemDefault));
    }

    #[tokio::test]
    async fn test_engine_failure_stops_attempts() {
        let mut synth = MockSpeechSynthesizer::new();
        synth
            .expect_speak()
            .times(1)
            .returning(|_, _, _| Err(SynthesisError::Failed("say: command not found".into())));

        let candidates = VoiceFallbackSelector::select(&LanguageProfile::lookup("en"));
        let used = speak_with_fallback(&synth, &candidates, "hello", &LanguageProfile::lookup("en")).await;
        assert_eq!(used, None);
    }
}
