use crate::system_voice::SpeechEngine;
use std::{fmt::Display, path::PathBuf, str::FromStr};
use talko_core::llm_client::ChatSettings;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Chat providers reachable through an OpenAI-compatible endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
    Gemini,
}

impl Provider {
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com/v1/",
            Provider::OpenAI => "https://api.openai.com/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    pub fn key_var(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3-5-sonnet-20240620",
            Provider::OpenAI => "gpt-4o",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub provider: Provider,
    pub chat_api_key: String,
    pub chat_model: String,
    pub chat_settings: ChatSettings,
    pub deepgram_api_key: String,
    pub deepgram_model: String,
    pub speech_engine: SpeechEngine,
    pub speech_rate: u32,
    pub progress_root: PathBuf,
    pub words_path: PathBuf,
    pub recording_path: PathBuf,
    pub prompts_path: Option<PathBuf>,
    pub log_level: Level,
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let provider_str =
            std::env::var("CHAT_PROVIDER").unwrap_or_else(|_| "anthropic".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "anthropic" => Provider::Anthropic,
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CHAT_PROVIDER".to_string(),
                    format!("'{other}' is not one of anthropic, openai, gemini"),
                ));
            }
        };

        let chat_api_key = std::env::var(provider.key_var()).map_err(|_| {
            ConfigError::MissingVar(format!(
                "{} must be set for '{}' provider",
                provider.key_var(),
                provider_str.to_lowercase()
            ))
        })?;
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| provider.default_model().to_string());

        let defaults = ChatSettings::default();
        let chat_settings = ChatSettings {
            max_tokens: parse_var("CHAT_MAX_TOKENS", defaults.max_tokens)?,
            temperature: parse_var("CHAT_TEMPERATURE", defaults.temperature)?,
        };

        let deepgram_api_key = std::env::var("DEEPGRAM_API_KEY")
            .map_err(|_| ConfigError::MissingVar("DEEPGRAM_API_KEY".to_string()))?;
        let deepgram_model =
            std::env::var("DEEPGRAM_MODEL").unwrap_or_else(|_| "nova-2".to_string());

        let speech_engine = parse_var("SPEECH_ENGINE", SpeechEngine::Say)?;
        let speech_rate = parse_var("SPEECH_RATE", 200u32)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            provider,
            chat_api_key,
            chat_model,
            chat_settings,
            deepgram_api_key,
            deepgram_model,
            speech_engine,
            speech_rate,
            progress_root: path_var("PROGRESS_ROOT", "."),
            words_path: path_var("WORDS_PATH", "/usr/share/dict/words"),
            recording_path: path_var("RECORDING_PATH", "recording.wav"),
            prompts_path: std::env::var("PROMPTS_PATH").ok().map(PathBuf::from),
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "CHAT_PROVIDER",
        "ANTHROPIC_API_KEY",
        "OPENAI_API_KEY",
        "GEMINI_API_KEY",
        "CHAT_MODEL",
        "CHAT_MAX_TOKENS",
        "CHAT_TEMPERATURE",
        "DEEPGRAM_API_KEY",
        "DEEPGRAM_MODEL",
        "SPEECH_ENGINE",
        "SPEECH_RATE",
        "PROGRESS_ROOT",
        "WORDS_PATH",
        "RECORDING_PATH",
        "PROMPTS_PATH",
        "RUST_LOG",
    ];

    fn clear_env_vars() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("ANTHROPIC_API_KEY", "test-anthropic-key");
            env::set_var("DEEPGRAM_API_KEY", "test-deepgram-key");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    fn test_provider_endpoints() {
        assert_eq!(Provider::Anthropic.api_base(), "https://api.anthropic.com/v1/");
        assert_eq!(Provider::OpenAI.key_var(), "OPENAI_API_KEY");
        assert_eq!(Provider::Gemini.default_model(), "gemini-2.0-flash");
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::Anthropic);
        assert_eq!(config.chat_api_key, "test-anthropic-key");
        assert_eq!(config.chat_model, "claude-3-5-sonnet-20240620");
        assert_eq!(config.chat_settings, ChatSettings::default());
        assert_eq!(config.deepgram_api_key, "test-deepgram-key");
        assert_eq!(config.deepgram_model, "nova-2");
        assert_eq!(config.speech_engine, SpeechEngine::Say);
        assert_eq!(config.speech_rate, 200);
        assert_eq!(config.progress_root, PathBuf::from("."));
        assert_eq!(config.words_path, PathBuf::from("/usr/share/dict/words"));
        assert_eq!(config.recording_path, PathBuf::from("recording.wav"));
        assert_eq!(config.prompts_path, None);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("CHAT_PROVIDER", "OpenAI");
            env::set_var("OPENAI_API_KEY", "custom-openai-key");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("CHAT_MAX_TOKENS", "512");
            env::set_var("CHAT_TEMPERATURE", "0.2");
            env::set_var("DEEPGRAM_API_KEY", "dg");
            env::set_var("DEEPGRAM_MODEL", "nova-3");
            env::set_var("SPEECH_ENGINE", "espeak-ng");
            env::set_var("SPEECH_RATE", "150");
            env::set_var("PROGRESS_ROOT", "/var/lib/talko");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.chat_api_key, "custom-openai-key");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.chat_settings.max_tokens, 512);
        assert!((config.chat_settings.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.deepgram_model, "nova-3");
        assert_eq!(config.speech_engine, SpeechEngine::EspeakNg);
        assert_eq!(config.speech_rate, 150);
        assert_eq!(config.progress_root, PathBuf::from("/var/lib/talko"));
        assert_eq!(config.prompts_path, Some(PathBuf::from("/custom/prompts")));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_missing_provider_key() {
        clear_env_vars();
        unsafe {
            env::set_var("CHAT_PROVIDER", "gemini");
            env::set_var("DEEPGRAM_API_KEY", "dg");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("GEMINI_API_KEY")),
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_deepgram_key() {
        clear_env_vars();
        unsafe {
            env::set_var("ANTHROPIC_API_KEY", "key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "DEEPGRAM_API_KEY"),
            _ => panic!("Expected MissingVar for DEEPGRAM_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_unknown_provider() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("CHAT_PROVIDER", "mistral");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "CHAT_PROVIDER"),
            _ => panic!("Expected InvalidValue for CHAT_PROVIDER"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_numbers_and_engine() {
        for (var, value) in [
            ("CHAT_MAX_TOKENS", "lots"),
            ("CHAT_TEMPERATURE", "warm"),
            ("SPEECH_RATE", "-5"),
            ("SPEECH_ENGINE", "festival"),
            ("RUST_LOG", "not-a-level"),
        ] {
            clear_env_vars();
            set_minimal_env();
            unsafe {
                env::set_var(var, value);
            }

            match Config::from_env().unwrap_err() {
                ConfigError::InvalidValue(name, _) => assert_eq!(name, var),
                other => panic!("Expected InvalidValue for {var}, got {other:?}"),
            }
        }
    }
}
