//! One outcome record per processed upload.
//!
//! Reporters are kept apart from diagnostics logging: they receive exactly
//! one [`Outcome`] for every top-level archive the pipeline finishes with,
//! whether it succeeded, got quarantined, or failed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};

use crate::classify::Disposition;
use crate::quarantine::QuarantineRecord;
use crate::{Error, Result};

pub const OUTCOME_LOG_NAME: &str = "outcomes.jsonl";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub timestamp: DateTime<Local>,
    pub archive: PathBuf,
    #[serde(flatten)]
    pub status: Status,
    /// Deepest nesting level that was extracted, 0 for a flat archive.
    pub nested_depth: usize,
    pub quarantined: Vec<QuarantineRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Completed {
        disposition: Disposition,
    },
    Failed {
        depth: Option<usize>,
        reason: String,
        /// Persisted staging directory holding the partial extraction.
        staging: Option<PathBuf>,
    },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, Status::Failed { .. })
    }

    pub fn disposition(&self) -> Option<Disposition> {
        match self.status {
            Status::Completed { disposition } => Some(disposition),
            Status::Failed { .. } => None,
        }
    }
}

pub trait Reporter: Send + Sync {
    fn record(&self, outcome: &Outcome) -> Result<()>;
}

impl<R: Reporter + ?Sized> Reporter for std::sync::Arc<R> {
    fn record(&self, outcome: &Outcome) -> Result<()> {
        (**self).record(outcome)
    }
}

/// Appends outcomes as JSON lines to a single file.
#[derive(Debug)]
pub struct JsonLinesReporter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<log_dir>/outcomes.jsonl`
    pub fn in_dir(log_dir: &Path) -> Self {
        Self::new(log_dir.join(OUTCOME_LOG_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Reporter for JsonLinesReporter {
    fn record(&self, outcome: &Outcome) -> Result<()> {
        let io_error = |source| Error::Io {
            path: self.path.clone(),
            source,
        };
        let mut line = serde_json::to_vec(outcome).map_err(|e| io_error(e.into()))?;
        line.push(b'\n');

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        file.write_all(&line).map_err(io_error)
    }
}

/// Mirrors outcomes into the diagnostic log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn record(&self, outcome: &Outcome) -> Result<()> {
        let archive = outcome.archive.display();
        match &outcome.status {
            Status::Completed { disposition } => info!(
                %archive,
                %disposition,
                nested_depth = outcome.nested_depth,
                quarantined = outcome.quarantined.len(),
                "upload processed"
            ),
            Status::Failed {
                depth,
                reason,
                staging,
            } => warn!(
                %archive,
                ?depth,
                %reason,
                staging = ?staging,
                "upload left untouched after failure"
            ),
        }
        for record in &outcome.quarantined {
            info!(
                %archive,
                destination = %record.destination.display(),
                rule = %record.rule,
                entries = record.entries.len(),
                "content quarantined"
            );
        }
        Ok(())
    }
}

/// Sends every outcome to each inner reporter.
#[derive(Default)]
pub struct FanoutReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl FanoutReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl Reporter for FanoutReporter {
    /// Every reporter sees the outcome; the first error is returned.
    fn record(&self, outcome: &Outcome) -> Result<()> {
        let mut first_error = None;
        for reporter in &self.reporters {
            if let Err(e) = reporter.record(outcome) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Keeps outcomes in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    outcomes: Mutex<Vec<Outcome>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Reporter for MemoryReporter {
    fn record(&self, outcome: &Outcome) -> Result<()> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
        Ok(())
    }
}
