//! Layered configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file,
//! the plain `CHECK_INTERVAL`/`MIN_STABLE_CHECKS`/`MAX_WAIT_TIME`/`LOG_DIR`
//! environment variables, `KIKOERU_`-prefixed variables for every field,
//! and finally command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::classify::DEFAULT_MARKER_PREFIX;
use crate::pipeline::DEFAULT_MAX_DEPTH;
use crate::stability::StabilityPolicy;

pub const CONFIG_FILE_NAME: &str = "kikoeru.toml";
pub const DEFAULT_LOG_DIR_NAME: &str = ".helper";

const PLAIN_ENV_KEYS: [&str; 4] = ["CHECK_INTERVAL", "MIN_STABLE_CHECKS", "MAX_WAIT_TIME", "LOG_DIR"];

/// Durations are whole seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub work_dir: PathBuf,
    pub check_interval: u64,
    pub min_stable_checks: u32,
    pub max_wait_time: u64,
    pub min_age: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    pub marker_prefix: String,
    pub max_depth: usize,
    pub unrar_program: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            check_interval: 5,
            min_stable_checks: 3,
            max_wait_time: 3600,
            min_age: 10,
            log_dir: None,
            marker_prefix: DEFAULT_MARKER_PREFIX.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            unrar_program: PathBuf::from("unrar"),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_stable_checks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wait_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// The provider stack for `work_dir`, without command-line overrides.
    ///
    /// `config_file` defaults to `<work_dir>/kikoeru.toml`; a missing file is
    /// not an error.
    pub fn figment(work_dir: &Path, config_file: Option<&Path>) -> Figment {
        let defaults = Config {
            work_dir: work_dir.to_path_buf(),
            ..Config::default()
        };
        let file = config_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| work_dir.join(CONFIG_FILE_NAME));

        Figment::from(Serialized::defaults(defaults))
            .merge(Toml::file(file))
            .merge(Env::raw().only(&PLAIN_ENV_KEYS))
            .merge(Env::prefixed("KIKOERU_"))
    }

    pub fn load(work_dir: &Path, config_file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let config = Self::figment(work_dir, config_file)
            .merge(Serialized::defaults(overrides))
            .extract()?;
        Ok(config)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.work_dir.join(DEFAULT_LOG_DIR_NAME))
    }

    /// Never zero, so a misconfigured interval cannot spin the poll loop.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval.max(1))
    }

    pub fn stability_policy(&self) -> StabilityPolicy {
        StabilityPolicy {
            min_stable_checks: self.min_stable_checks,
            max_wait: Duration::from_secs(self.max_wait_time),
            min_age: Duration::from_secs(self.min_age),
        }
    }
}
