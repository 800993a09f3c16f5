//! Boundaries to the audio world: synthesis, recognition and the learner's microphone.

use crate::{annotation::AnnotatedText, language::LanguageProfile, voice::VoiceCandidate};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Transcript used when the recognizer heard nothing.
pub const NO_SPEECH_DETECTED: &str = "(no speech detected)";
/// Transcript used when recognition failed for any reason.
pub const RECOGNITION_ERROR: &str = "(error in speech recognition)";

/// Why a synthesis attempt did not produce audio.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// The requested voice is not installed; the caller should try the next candidate.
    #[error("voice {0:?} is not available")]
    VoiceUnavailable(String),
    #[error("speech synthesis failed: {0}")]
    Failed(String),
}

/// Speaks text aloud and returns once playback has finished.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(
        &self,
        text: &str,
        language: &LanguageProfile,
        voice: &VoiceCandidate,
    ) -> Result<(), SynthesisError>;

    /// Adapts the generic candidate list to what this engine understands.
    fn candidates(&self, language: &LanguageProfile) -> Vec<VoiceCandidate> {
        crate::voice::VoiceFallbackSelector::select(language)
    }
}

/// Audio captured for one learner turn, encoded as a WAV file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedAudio {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    pub samples: usize,
}

impl CapturedAudio {
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples as f32 / self.sample_rate as f32
        }
    }
}

/// Turns captured audio into text.
///
/// Never fails: problems are reported through [`NO_SPEECH_DETECTED`] and
/// [`RECOGNITION_ERROR`], which the dialogue treats as ordinary learner messages.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn transcribe(&self, audio: &CapturedAudio, locale: &str) -> String;
}

/// What the learner chose at the start of their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerSignal {
    /// Start recording.
    Ready,
    /// End the session now.
    Cancel,
}

/// The human side of a turn.
#[async_trait]
pub trait LearnerInput: Send + Sync {
    /// Blocks until the learner asks to record or to stop the session.
    async fn await_ready(&self) -> LearnerSignal;

    /// Records until the learner signals they are done speaking.
    async fn capture(&self) -> anyhow::Result<CapturedAudio>;
}

/// Receives what the learner should see while a session runs.
///
/// All methods default to doing nothing, so tests only implement what they check.
pub trait SessionObserver: Send + Sync {
    fn inspiration_words(&self, _words: &[String; 2]) {}
    fn topic_reasoning(&self, _reasoning: &str) {}
    fn topic_selected(&self, _topic: &str) {}
    /// A tutor turn, numbered from 1.
    fn tutor_turn(&self, _turn: usize, _text: &AnnotatedText) {}
    fn learner_turn(&self, _transcript: &str) {}
    fn session_cancelled(&self) {}
    fn finalizing(&self) {}
}
