//! Upload stability tracking.
//!
//! Chunked uploads make a file appear long before it is complete, so a path
//! is only admitted after its [`Footprint`] stayed the same for several
//! consecutive polls. The [`Registry`] is a plain state machine: the caller
//! measures, passes in the current instant and acts on the [`TickReport`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use kikoeru_fs::Footprint;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilityPolicy {
    pub min_stable_checks: u32,
    pub max_wait: Duration,
    /// A path modified more recently than this never counts as unchanged.
    pub min_age: Duration,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self {
            min_stable_checks: 3,
            max_wait: Duration::from_secs(3600),
            min_age: Duration::from_secs(10),
        }
    }
}

/// One measurement of a candidate path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub footprint: Footprint,
    /// Time since the path was last modified.
    pub age: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,
    pub first_seen_footprint: Footprint,
    pub last_footprint: Footprint,
    pub consecutive_stable_checks: u32,
    pub first_seen_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Tracking,
    Stable,
    TimedOut,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub admitted: Vec<PathBuf>,
    pub timed_out: Vec<PathBuf>,
    pub evicted: Vec<PathBuf>,
}

/// Owned set of [`WorkItem`]s keyed by path.
///
/// Items are created on first observation and leave the registry when they
/// become stable, time out, or stop being observed.
#[derive(Debug)]
pub struct Registry {
    policy: StabilityPolicy,
    items: HashMap<PathBuf, WorkItem>,
}

impl Registry {
    pub fn new(policy: StabilityPolicy) -> Self {
        Self {
            policy,
            items: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &StabilityPolicy {
        &self.policy
    }

    pub fn get(&self, path: &Path) -> Option<&WorkItem> {
        self.items.get(path)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Feed one measurement of `path` taken at `now`.
    pub fn observe(&mut self, path: &Path, observation: Observation, now: Instant) -> Verdict {
        let policy = self.policy;
        let item = self
            .items
            .entry(path.to_path_buf())
            .and_modify(|item| {
                if item.last_footprint == observation.footprint
                    && observation.age >= policy.min_age
                {
                    item.consecutive_stable_checks += 1;
                } else {
                    item.last_footprint = observation.footprint;
                    item.consecutive_stable_checks = 0;
                }
            })
            .or_insert_with(|| WorkItem {
                path: path.to_path_buf(),
                first_seen_footprint: observation.footprint,
                last_footprint: observation.footprint,
                consecutive_stable_checks: 0,
                first_seen_at: now,
            });

        let verdict = if item.consecutive_stable_checks >= policy.min_stable_checks {
            Verdict::Stable
        } else if now.saturating_duration_since(item.first_seen_at) > policy.max_wait {
            Verdict::TimedOut
        } else {
            Verdict::Tracking
        };

        if verdict != Verdict::Tracking {
            self.items.remove(path);
        }
        verdict
    }

    /// Advance every tracked path by one poll.
    ///
    /// Paths tracked before but missing from `observations` are evicted.
    pub fn tick<I>(&mut self, observations: I, now: Instant) -> TickReport
    where
        I: IntoIterator<Item = (PathBuf, Observation)>,
    {
        let mut report = TickReport::default();
        let mut seen = HashSet::new();

        for (path, observation) in observations {
            match self.observe(&path, observation, now) {
                Verdict::Stable => report.admitted.push(path.clone()),
                Verdict::TimedOut => report.timed_out.push(path.clone()),
                Verdict::Tracking => {}
            }
            seen.insert(path);
        }

        let gone: Vec<PathBuf> = self
            .items
            .keys()
            .filter(|p| !seen.contains(*p))
            .cloned()
            .collect();
        for path in gone {
            self.items.remove(&path);
            report.evicted.push(path);
        }

        report.admitted.sort();
        report.timed_out.sort();
        report.evicted.sort();
        report
    }
}
