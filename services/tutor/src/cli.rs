use clap::Parser;
use talko_core::level::ProficiencyLevel;

pub const INVALID_LEVEL_MESSAGE: &str =
    "Invalid level. Please use 'diagnostic' or a number between 1 and 10.";

/// Spoken language tutoring: a placement test or a lesson at your level.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(version, about)]
pub struct Args {
    /// Language code of the target language (e.g. es, fr, ja)
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// 'diagnostic' for a placement test, or a level from 1 to 10
    #[arg(long, default_value = "diagnostic")]
    pub level: String,

    /// Learner name; progress is kept in a folder of this name
    #[arg(long)]
    pub user: String,
}

/// What `--level` asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelArg {
    Diagnostic,
    Lesson(ProficiencyLevel),
}

impl LevelArg {
    /// Accepts `diagnostic` or a plain decimal number in 1..=10.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "diagnostic" {
            return Some(LevelArg::Diagnostic);
        }
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value: i64 = raw.parse().ok()?;
        ProficiencyLevel::new(value).ok().map(LevelArg::Lesson)
    }
}
