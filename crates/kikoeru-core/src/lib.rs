//! Watches a shared upload directory and sorts archive uploads.
//!
//! # Architecture
//!
//! - `password.rs` - password chains parsed from upload names
//! - `classify.rs` - the disposition rules for one extraction
//! - `stability.rs` - upload-finished detection
//! - `pipeline.rs` - recursive extraction, plan then apply
//! - `quarantine.rs` - the artifact left for human review
//! - `report.rs` - one outcome record per upload
//! - `config.rs` - layered configuration
//! - `monitor.rs` - the polling loop tying it together

pub use classify::{Classifier, Disposition, Entry, ExtractionResult, QuarantineRule};
pub use config::{Config, Overrides};
pub use error::{Error, Result};
pub use monitor::Monitor;
pub use password::{PasswordAnomaly, PasswordChain, ResolvedName};
pub use pipeline::RecursiveExtractor;
pub use quarantine::QuarantineRecord;
pub use report::{
    FanoutReporter, JsonLinesReporter, MemoryReporter, Outcome, Reporter, Status, TracingReporter,
};
pub use stability::{Observation, Registry, StabilityPolicy, TickReport, Verdict, WorkItem};

pub mod classify;
pub mod config;
mod error;
pub mod monitor;
pub mod password;
pub mod pipeline;
pub mod quarantine;
pub mod report;
pub mod stability;
