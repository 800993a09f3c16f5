//! Main Entrypoint for the Talko tutor
//!
//! This binary is responsible for:
//! 1. Parsing and validating the command line.
//! 2. Loading configuration from the environment.
//! 3. Initializing the chat, speech and progress services.
//! 4. Running one diagnostic test or lesson and reporting the result.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use clap::Parser;
use std::sync::Arc;
use talko::{
    capture::{CancelSignal, MicrophoneCapture, TerminalLearner},
    cli::{Args, INVALID_LEVEL_MESSAGE, LevelArg},
    config::Config,
    deepgram::DeepgramRecognizer,
    system_voice::SystemVoice,
    terminal::{self, ConsolePresenter},
};
use talko_core::{
    dialogue::{DialogueOrchestrator, SessionServices},
    language::LanguageProfile,
    llm_client::{ChatClient, OpenAICompatibleClient},
    progress::ProgressStore,
    prompts::Prompts,
    speech::SessionObserver,
    topic::{DictionaryWordSource, LLMTopicService},
};
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // --- 1. Parse Arguments ---
    let args = Args::parse();
    let Some(level_arg) = LevelArg::parse(&args.level) else {
        println!("{INVALID_LEVEL_MESSAGE}");
        return Ok(());
    };

    // --- 2. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 3. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing services...");

    // --- 4. Initialize Shared Services ---
    let prompts = match &config.prompts_path {
        Some(path) => Prompts::with_overrides(path)?,
        None => Prompts::default(),
    };
    let prompts = Arc::new(prompts);

    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.chat_api_key)
        .with_api_base(config.provider.api_base());
    let chat: Arc<dyn ChatClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
        config.chat_settings,
    ));

    let language = LanguageProfile::lookup(&args.lang);
    if !language.is_known() {
        warn!(code = %args.lang, "Unknown language code, using defaults");
    }

    let cancel = CancelSignal::install();
    let observer: Arc<dyn SessionObserver> = match level_arg {
        LevelArg::Diagnostic => Arc::new(ConsolePresenter::for_diagnostic()),
        LevelArg::Lesson(_) => Arc::new(ConsolePresenter::for_lesson()),
    };

    let services = SessionServices {
        topics: Arc::new(LLMTopicService::new(
            chat.clone(),
            Arc::new(DictionaryWordSource::new(config.words_path.clone())),
            prompts.clone(),
        )),
        chat,
        synthesizer: Arc::new(SystemVoice::new(config.speech_engine, config.speech_rate)),
        recognizer: Arc::new(DeepgramRecognizer::new(
            config.deepgram_api_key.clone(),
            config.deepgram_model.clone(),
        )),
        learner: Arc::new(TerminalLearner::new(
            MicrophoneCapture::new(config.recording_path.clone()),
            cancel,
        )),
        observer,
        store: ProgressStore::new(config.progress_root.clone()),
        prompts,
    };
    let orchestrator = DialogueOrchestrator::new(services);

    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        engine = %config.speech_engine,
        learner = %args.user,
        "Services configured. Starting session..."
    );

    // --- 5. Run the Session ---
    match level_arg {
        LevelArg::Diagnostic => {
            terminal::notice(&format!(
                "Starting diagnostic test for {}...",
                language.display_name
            ));
            let outcome = orchestrator
                .run_diagnostic(&args.user, &language)
                .await
                .inspect_err(|e| terminal::error(&e.to_string()))
                .context("Diagnostic test failed")?;
            println!(
                "Your proficiency level in {} is: {}/10",
                language.display_name, outcome.level
            );
        }
        LevelArg::Lesson(level) => {
            terminal::notice(&format!(
                "Starting a level {level} lesson in {}...",
                language.display_name
            ));
            orchestrator
                .run_lesson(&args.user, &language, level)
                .await
                .inspect_err(|e| terminal::error(&e.to_string()))
                .context("Lesson failed")?;
        }
    }

    println!("Lesson complete. Thank you for learning with us!");
    Ok(())
}
