//! The watch loop.
//!
//! Every `check_interval` the working directory is scanned, candidate
//! archives are measured and fed to the stability [`Registry`], and stable
//! uploads are processed on tokio's blocking pool. Runs for different
//! uploads proceed concurrently; one upload never has two runs at once.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::Local;
use kikoeru_archive::ArchiveExtractor;
use kikoeru_fs::Footprint;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::pipeline::RecursiveExtractor;
use crate::report::{Outcome, Reporter, Status};
use crate::stability::{Observation, Registry, StabilityPolicy};
use crate::{Error, Result};

pub struct Monitor<E> {
    work_dir: PathBuf,
    poll_interval: Duration,
    pipeline: Arc<RecursiveExtractor<E>>,
    reporter: Arc<dyn Reporter>,
    registry: Registry,
    in_flight: HashSet<PathBuf>,
    /// Upload handled by each spawned run.
    tasks: HashMap<Id, PathBuf>,
    /// Footprint of each upload whose run failed, as it was after the failure.
    failed: HashMap<PathBuf, Footprint>,
    runs: JoinSet<Outcome>,
}

impl<E: ArchiveExtractor + 'static> Monitor<E> {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        poll_interval: Duration,
        policy: StabilityPolicy,
        pipeline: RecursiveExtractor<E>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            poll_interval,
            pipeline: Arc::new(pipeline),
            reporter,
            registry: Registry::new(policy),
            in_flight: HashSet::new(),
            tasks: HashMap::new(),
            failed: HashMap::new(),
            runs: JoinSet::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Poll until `shutdown` resolves, then wait for in-flight runs.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if !self.work_dir.is_dir() {
            return Err(Error::Io {
                path: self.work_dir.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }
        info!(
            work_dir = %self.work_dir.display(),
            interval_secs = self.poll_interval.as_secs(),
            policy = ?self.registry.policy(),
            "monitoring"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(in_flight = self.in_flight.len(), "shutdown requested");
                    break;
                }
                Some(joined) = self.runs.join_next_with_id() => {
                    self.finish(joined);
                }
                _ = interval.tick() => self.tick(),
            }
        }

        let finished = self.drain().await;
        info!(finished = finished.len(), "monitor stopped");
        Ok(())
    }

    /// One poll: scan, measure, advance the registry and start stable runs.
    pub fn tick(&mut self) {
        let candidates = match self.scan() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(work_dir = %self.work_dir.display(), error = %e, "scan failed");
                return;
            }
        };

        self.failed.retain(|path, _| candidates.contains(path));

        let mut observations = Vec::with_capacity(candidates.len());
        for path in candidates {
            if self.in_flight.contains(&path) {
                continue;
            }
            let footprint = match Footprint::measure(&path) {
                Ok(footprint) => footprint,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "could not measure");
                    continue;
                }
            };
            if let Some(previous) = self.failed.get(&path) {
                if *previous == footprint {
                    continue;
                }
                info!(path = %path.display(), "changed since its failed run, tracking again");
                self.failed.remove(&path);
            }
            let age = upload_age(footprint.modified, SystemTime::now());
            observations.push((path, Observation { footprint, age }));
        }

        let report = self.registry.tick(observations, Instant::now());
        for path in &report.evicted {
            debug!(path = %path.display(), "no longer present, evicted");
        }
        for path in &report.timed_out {
            warn!(
                path = %path.display(),
                max_wait_secs = self.registry.policy().max_wait.as_secs(),
                "did not stabilize in time, will be tracked again"
            );
        }
        for path in report.admitted {
            self.spawn(path);
        }
    }

    /// Wait for every in-flight run and return their outcomes.
    pub async fn drain(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Some(joined) = self.runs.join_next_with_id().await {
            if let Some(outcome) = self.finish(joined) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Non-hidden regular files in the working directory that look like archives.
    fn scan(&self) -> Result<Vec<PathBuf>> {
        let io_error = |source| Error::Io {
            path: self.work_dir.clone(),
            source,
        };
        let mut candidates = Vec::new();
        for item in std::fs::read_dir(&self.work_dir).map_err(io_error)? {
            let path = item.map_err(io_error)?.path();
            if is_hidden(&path) {
                continue;
            }
            if self.pipeline.extractor().looks_like_archive(&path) {
                candidates.push(path);
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    fn spawn(&mut self, path: PathBuf) {
        info!(path = %path.display(), "upload stable, processing");
        self.in_flight.insert(path.clone());
        let pipeline = Arc::clone(&self.pipeline);
        let reporter = Arc::clone(&self.reporter);

        let task = {
            let path = path.clone();
            self.runs
                .spawn_blocking(move || pipeline.run_reported(&path, reporter.as_ref()))
        };
        self.tasks.insert(task.id(), path);
    }

    fn finish(&mut self, joined: std::result::Result<(Id, Outcome), JoinError>) -> Option<Outcome> {
        let (path, outcome) = match joined {
            Ok((id, outcome)) => {
                let path = self
                    .tasks
                    .remove(&id)
                    .unwrap_or_else(|| outcome.archive.clone());
                (path, outcome)
            }
            Err(e) => {
                let path = self.tasks.remove(&e.id())?;
                error!(path = %path.display(), error = %e, "processing task did not finish");
                let outcome = Outcome {
                    timestamp: Local::now(),
                    archive: path.clone(),
                    status: Status::Failed {
                        depth: None,
                        reason: if e.is_panic() {
                            "processing panicked".to_string()
                        } else {
                            "processing was cancelled".to_string()
                        },
                        staging: None,
                    },
                    nested_depth: 0,
                    quarantined: Vec::new(),
                };
                if let Err(e) = self.reporter.record(&outcome) {
                    error!(path = %path.display(), error = %e, "failed to record outcome");
                }
                (path, outcome)
            }
        };
        self.in_flight.remove(&path);

        if outcome.is_failure() {
            match Footprint::measure(&path) {
                Ok(footprint) => {
                    self.failed.insert(path, footprint);
                }
                Err(e) => debug!(path = %path.display(), error = %e, "failed upload is gone"),
            }
        }
        Some(outcome)
    }
}

/// Time since the last write, saturating when the clock disagrees.
///
/// An mtime ahead of the clock, or none at all, counts as old enough; the
/// unchanged-footprint checks still have to pass.
fn upload_age(modified: Option<SystemTime>, now: SystemTime) -> Duration {
    modified
        .and_then(|modified| now.duration_since(modified).ok())
        .unwrap_or(Duration::MAX)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}
