//! Speech recognition through Deepgram's prerecorded audio endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use talko_core::speech::{CapturedAudio, NO_SPEECH_DETECTED, RECOGNITION_ERROR, SpeechRecognizer};
use tracing::{debug, info, warn};

pub const LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

impl ListenResponse {
    /// The best transcript of the first channel, if any.
    fn transcript(self) -> Option<String> {
        self.results
            .channels
            .into_iter()
            .next()?
            .alternatives
            .into_iter()
            .next()
            .map(|alternative| alternative.transcript)
    }
}

pub struct DeepgramRecognizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl DeepgramRecognizer {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_endpoint(api_key, model, LISTEN_URL.to_string())
    }

    pub fn with_endpoint(api_key: String, model: String, endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            endpoint,
        }
    }

    async fn request(&self, audio: &CapturedAudio, locale: &str) -> Result<String> {
        let response: ListenResponse = self
            .http
            .post(&self.endpoint)
            .query(&[
                ("model", self.model.as_str()),
                ("smart_format", "true"),
                ("language", locale),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.api_key))
            .header(CONTENT_TYPE, "audio/wav")
            .body(audio.wav.clone())
            .send()
            .await
            .context("Deepgram request failed")?
            .error_for_status()
            .context("Deepgram rejected the request")?
            .json()
            .await
            .context("Could not decode Deepgram response")?;
        Ok(response.transcript().unwrap_or_default())
    }
}

#[async_trait]
impl SpeechRecognizer for DeepgramRecognizer {
    async fn transcribe(&self, audio: &CapturedAudio, locale: &str) -> String {
        if audio.is_empty() {
            debug!("Nothing was recorded");
            return NO_SPEECH_DETECTED.to_string();
        }
        debug!(locale, seconds = audio.duration_secs(), model = %self.model, "Transcribing");
        match self.request(audio, locale).await {
            Ok(transcript) if transcript.trim().is_empty() => {
                info!("No speech detected");
                NO_SPEECH_DETECTED.to_string()
            }
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(error = ?e, "Speech recognition failed");
                RECOGNITION_ERROR.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio() -> CapturedAudio {
        CapturedAudio {
            wav: vec![0; 64],
            sample_rate: 16_000,
            samples: 10,
        }
    }

    #[test]
    fn test_transcript_from_response() {
        let json = r#"{
            "metadata": {"request_id": "abc"},
            "results": {"channels": [{"alternatives": [
                {"transcript": "Me llamo Ana.", "confidence": 0.98},
                {"transcript": "Me yamo Ana.", "confidence": 0.41}
            ]}]}
        }"#;
        let response: ListenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.transcript().as_deref(), Some("Me llamo Ana."));
    }

    #[test]
    fn test_transcript_missing_alternatives() {
        let response: ListenResponse =
            serde_json::from_str(r#"{"results": {"channels": []}}"#).unwrap();
        assert_eq!(response.transcript(), None);
    }

    #[tokio::test]
    async fn test_empty_audio_is_no_speech() {
        let recognizer = DeepgramRecognizer::with_endpoint(
            "key".into(),
            "nova-2".into(),
            "http://127.0.0.1:9/v1/listen".into(),
        );
        let transcript = recognizer
            .transcribe(&CapturedAudio::default(), "en-US")
            .await;
        assert_eq!(transcript, NO_SPEECH_DETECTED);
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_error_sentinel() {
        let recognizer = DeepgramRecognizer::with_endpoint(
            "key".into(),
            "nova-2".into(),
            "http://127.0.0.1:9/v1/listen".into(),
        );
        assert_eq!(recognizer.transcribe(&audio(), "es-419").await, RECOGNITION_ERROR);
    }
}
