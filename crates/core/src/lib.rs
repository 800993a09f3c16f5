//! Session orchestration for spoken language tutoring.
//!
//! The crate is independent of any particular audio stack: speech synthesis,
//! recognition and the learner's microphone are traits in [`speech`], implemented by
//! the binary. [`dialogue::DialogueOrchestrator`] ties them together.

pub mod annotation;
pub mod dialogue;
pub mod language;
pub mod level;
pub mod llm_client;
pub mod narrative;
pub mod progress;
pub mod prompts;
pub mod speech;
pub mod topic;
pub mod voice;
