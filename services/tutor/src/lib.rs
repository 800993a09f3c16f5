//! Talko Tutor Library Crate
//!
//! The adapters that connect `talko-core` to the outside world: environment
//! configuration, the command line, the microphone and terminal, Deepgram recognition
//! and the system's speech synthesizer. `bin/talko.rs` is a thin wrapper around this
//! library.

pub mod capture;
pub mod cli;
pub mod config;
pub mod deepgram;
pub mod system_voice;
pub mod terminal;
