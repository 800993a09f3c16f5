//! Per-learner progress records.
//!
//! Each learner owns a directory under the store root. Every finished session adds one
//! JSON record; records are never rewritten. The newest record is the one with the
//! highest embedded `sequence`, so ordering does not depend on filesystem metadata.

use crate::{language::LanguageProfile, level::ProficiencyLevel};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

const RECORD_PREFIX: &str = "progress_";
const RECORD_EXTENSION: &str = "json";

/// Errors raised by [`ProgressStore`].
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("invalid learner id {0:?}: must be a non-empty name without path separators")]
    InvalidLearner(String),
    #[error("progress storage error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize progress record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The three free-text fields that carry over between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeFields {
    pub overall_progress: String,
    pub language_goals: String,
    pub proximal_development: String,
}

impl NarrativeFields {
    /// Fills every blank field from `previous`.
    pub fn or_carry_forward(self, previous: Option<&NarrativeFields>) -> Self {
        let pick = |fresh: String, prior: Option<&String>| {
            if fresh.trim().is_empty() {
                prior.cloned().unwrap_or_default()
            } else {
                fresh
            }
        };
        Self {
            overall_progress: pick(
                self.overall_progress,
                previous.map(|p| &p.overall_progress),
            ),
            language_goals: pick(self.language_goals, previous.map(|p| &p.language_goals)),
            proximal_development: pick(
                self.proximal_development,
                previous.map(|p| &p.proximal_development),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overall_progress.is_empty()
            && self.language_goals.is_empty()
            && self.proximal_development.is_empty()
    }
}

/// A snapshot written after one diagnostic or lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Local wall-clock time, `%Y%m%d_%H%M%S_%6f`.
    pub timestamp: String,
    /// Position in the learner's history; records written before sequences existed read as 0.
    #[serde(default)]
    pub sequence: u64,
    /// Display name of the language studied.
    pub language: String,
    pub current_level: ProficiencyLevel,
    pub lesson_summary: String,
    #[serde(flatten)]
    pub narrative: NarrativeFields,
}

/// File-backed store rooted at a directory holding one folder per learner.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    root: PathBuf,
}

impl ProgressStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding `learner`'s records.
    pub fn learner_dir(&self, learner: &str) -> Result<PathBuf, ProgressError> {
        let valid = !learner.trim().is_empty()
            && learner != "."
            && learner != ".."
            && !learner.contains(['/', '\\']);
        if !valid {
            return Err(ProgressError::InvalidLearner(learner.to_string()));
        }
        Ok(self.root.join(learner))
    }

    /// Returns the learner's newest record, or `None` for a first-time learner.
    pub fn read_latest(&self, learner: &str) -> Result<Option<ProgressRecord>, ProgressError> {
        let dir = self.learner_dir(learner)?;
        if !dir.is_dir() {
            debug!(learner, "No progress directory yet");
            return Ok(None);
        }

        let entries = fs::read_dir(&dir).map_err(|source| ProgressError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut latest: Option<ProgressRecord> = None;
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable progress entry");
                    continue;
                }
            };
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let record = match read_record(&path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable progress record");
                    continue;
                }
            };
            let newer = latest.as_ref().is_none_or(|current| {
                (record.sequence, &record.timestamp) > (current.sequence, &current.timestamp)
            });
            if newer {
                latest = Some(record);
            }
        }
        Ok(latest)
    }

    /// Writes a new record for `learner`.
    ///
    /// Blank narrative fields are taken from the newest existing record (or left empty
    /// when there is none), so a populated field never reverts to empty.
    pub fn write(
        &self,
        learner: &str,
        language: &LanguageProfile,
        level: ProficiencyLevel,
        lesson_summary: &str,
        narrative: NarrativeFields,
    ) -> Result<ProgressRecord, ProgressError> {
        let dir = self.learner_dir(learner)?;
        fs::create_dir_all(&dir).map_err(|source| ProgressError::Io {
            path: dir.clone(),
            source,
        })?;

        let previous = self.read_latest(learner)?;
        let record = ProgressRecord {
            timestamp: Local::now().format("%Y%m%d_%H%M%S_%6f").to_string(),
            sequence: previous.as_ref().map_or(1, |p| p.sequence + 1),
            language: language.display_name.to_string(),
            current_level: level,
            lesson_summary: lesson_summary.to_string(),
            narrative: narrative.or_carry_forward(previous.as_ref().map(|p| &p.narrative)),
        };

        let path = dir.join(format!(
            "{RECORD_PREFIX}{:06}_{}.{RECORD_EXTENSION}",
            record.sequence, record.timestamp
        ));
        let mut json = serde_json::to_string_pretty(&record)?;
        json.push('\n');

        let io_err = |source| ProgressError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        info!(
            learner,
            sequence = record.sequence,
            level = %record.current_level,
            path = %path.display(),
            "Progress record written"
        );
        Ok(record)
    }
}

fn read_record(path: &Path) -> anyhow::Result<ProgressRecord> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
