//! Speech synthesis through the operating system's command-line voices.

use async_trait::async_trait;
use std::{fmt, process::Stdio, str::FromStr};
use talko_core::{
    language::LanguageProfile,
    speech::{SpeechSynthesizer, SynthesisError},
    voice::{VoiceCandidate, VoiceFallbackSelector},
};
use tokio::process::Command;
use tracing::debug;

/// Which command renders speech.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechEngine {
    /// macOS `say`.
    Say,
    EspeakNg,
}

impl SpeechEngine {
    pub fn program(self) -> &'static str {
        match self {
            SpeechEngine::Say => "say",
            SpeechEngine::EspeakNg => "espeak-ng",
        }
    }
}

impl FromStr for SpeechEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "say" => Ok(SpeechEngine::Say),
            "espeak-ng" | "espeak" => Ok(SpeechEngine::EspeakNg),
            other => Err(format!("'{other}' is not a supported speech engine (use 'say' or 'espeak-ng')")),
        }
    }
}

impl fmt::Display for SpeechEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Speaks by running `say` or `espeak-ng` and waiting for it to exit.
pub struct SystemVoice {
    engine: SpeechEngine,
    /// Words per minute.
    rate: u32,
}

impl SystemVoice {
    pub fn new(engine: SpeechEngine, rate: u32) -> Self {
        Self { engine, rate }
    }

    fn args(&self, text: &str, voice: &VoiceCandidate) -> Vec<String> {
        let mut args = Vec::with_capacity(6);
        if let Some(name) = voice.name() {
            args.push("-v".to_string());
            args.push(name.to_string());
        }
        let rate_flag = match self.engine {
            SpeechEngine::Say => "-r",
            SpeechEngine::EspeakNg => "-s",
        };
        args.push(rate_flag.to_string());
        args.push(self.rate.to_string());
        // Tutor text may open with a markdown bullet.
        args.push("--".to_string());
        args.push(text.to_string());
        args
    }
}

#[async_trait]
impl SpeechSynthesizer for SystemVoice {
    async fn speak(
        &self,
        text: &str,
        _language: &LanguageProfile,
        voice: &VoiceCandidate,
    ) -> Result<(), SynthesisError> {
        debug!(engine = %self.engine, %voice, chars = text.len(), "Speaking");
        let output = Command::new(self.engine.program())
            .args(self.args(text, voice))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SynthesisError::Failed(format!("could not run {}: {e}", self.engine)))?;

        if output.status.success() {
            return Ok(());
        }
        // Killed by a signal such as Ctrl+C, not a missing voice.
        if output.status.code().is_none() {
            debug!(engine = %self.engine, status = %output.status, "Speech interrupted");
            return Err(SynthesisError::Failed(format!(
                "{} was interrupted ({})",
                self.engine, output.status
            )));
        }
        match voice {
            VoiceCandidate::Named(name) => Err(SynthesisError::VoiceUnavailable(name.clone())),
            VoiceCandidate::SystemDefault => Err(SynthesisError::Failed(format!(
                "{} exited with {}: {}",
                self.engine,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn candidates(&self, language: &LanguageProfile) -> Vec<VoiceCandidate> {
        match self.engine {
            SpeechEngine::Say => VoiceFallbackSelector::select(language),
            // espeak-ng names its voices after language tags.
            SpeechEngine::EspeakNg => {
                let names = [language.recognizer_locale.to_lowercase(), language.code.to_lowercase()];
                VoiceFallbackSelector::from_names(names.iter().map(String::as_str))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talko_core::voice::speak_with_fallback;

    #[test]
    fn test_engine_from_str() {
        assert_eq!("say".parse::<SpeechEngine>().unwrap(), SpeechEngine::Say);
        assert_eq!(" ESPEAK-NG ".parse::<SpeechEngine>().unwrap(), SpeechEngine::EspeakNg);
        assert!("festival".parse::<SpeechEngine>().is_err());
    }

    #[test]
    fn test_say_args_with_named_voice() {
        let voice = SystemVoice::new(SpeechEngine::Say, 200);
        let args = voice.args("Bonjour", &VoiceCandidate::Named("Thomas".into()));
        assert_eq!(args, vec!["-v", "Thomas", "-r", "200", "--", "Bonjour"]);

        let args = voice.args("- casa - perro", &VoiceCandidate::Named("Juan".into()));
        assert_eq!(args, vec!["-v", "Juan", "-r", "200", "--", "- casa - perro"]);
    }

    #[test]
    fn test_system_default_omits_voice_flag() {
        let voice = SystemVoice::new(SpeechEngine::EspeakNg, 160);
        let args = voice.args("Hallo", &VoiceCandidate::SystemDefault);
        assert_eq!(args, vec!["-s", "160", "--", "Hallo"]);

        let args = voice.args("-ich bin da", &VoiceCandidate::SystemDefault);
        assert_eq!(args, vec!["-s", "160", "--", "-ich bin da"]);
    }

    #[test]
    fn test_espeak_candidates_use_language_tags() {
        let voice = SystemVoice::new(SpeechEngine::EspeakNg, 160);
        let candidates = voice.candidates(&LanguageProfile::lookup("es"));
        assert_eq!(
            candidates,
            vec![
                VoiceCandidate::Named("es-419".into()),
                VoiceCandidate::Named("es".into()),
                VoiceCandidate::SystemDefault,
            ]
        );
    }

    #[test]
    fn test_say_candidates_follow_language_table() {
        let voice = SystemVoice::new(SpeechEngine::Say, 200);
        let candidates = voice.candidates(&LanguageProfile::lookup("fr"));
        assert_eq!(candidates.first(), Some(&VoiceCandidate::Named("Thomas".into())));
        assert_eq!(candidates.last(), Some(&VoiceCandidate::SystemDefault));
    }

    /// Puts a fake `say` first on `PATH`; it logs its arguments and then runs `body`.
    #[cfg(unix)]
    fn fake_say(dir: &tempfile::TempDir, body: &str) -> (std::path::PathBuf, String) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.path().join("calls.log");
        let script = dir.path().join("say");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\n{body}\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let path = format!(
            "{}:{}",
            dir.path().display(),
            std::env::var("PATH").unwrap_or_default()
        );
        (log, path)
    }

    #[cfg(unix)]
    fn with_path<T>(path: &str, f: impl FnOnce() -> T) -> T {
        let saved = std::env::var_os("PATH");
        unsafe {
            std::env::set_var("PATH", path);
        }
        let result = f();
        unsafe {
            match saved {
                Some(value) => std::env::set_var("PATH", value),
                None => std::env::remove_var("PATH"),
            }
        }
        result
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial]
    fn test_interrupted_engine_stops_fallback() {
        let dir = tempfile::TempDir::new().unwrap();
        let (log, path) = fake_say(&dir, "kill -TERM $$");
        let language = LanguageProfile::lookup("fr");

        let used = with_path(&path, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let voice = SystemVoice::new(SpeechEngine::Say, 200);
                let candidates = voice.candidates(&language);
                speak_with_fallback(&voice, &candidates, "Bonjour", &language).await
            })
        });

        assert_eq!(used, None);
        let calls = std::fs::read_to_string(log).unwrap();
        assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["-v Thomas -r 200 -- Bonjour"]);
    }

    #[cfg(unix)]
    #[test]
    #[serial_test::serial]
    fn test_failing_named_voice_is_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let (log, path) = fake_say(&dir, "exit 1");
        let language = LanguageProfile::lookup("fr");

        let used = with_path(&path, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let voice = SystemVoice::new(SpeechEngine::Say, 200);
                voice
                    .speak("Bonjour", &language, &VoiceCandidate::Named("Thomas".into()))
                    .await
            })
        });

        assert!(matches!(used, Err(SynthesisError::VoiceUnavailable(name)) if name == "Thomas"));
        assert_eq!(std::fs::read_to_string(log).unwrap().lines().count(), 1);
    }
}
