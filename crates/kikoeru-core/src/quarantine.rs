//! The artifact left behind for content that needs a human decision.
//!
//! A quarantine directory `<YYYYMMDD>-<base name>` sits in the working
//! directory and holds every top-level entry of the extraction plus a
//! `processing_log.txt` describing why it ended up there.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use kikoeru_fs::{AtomicWriteOptions, atomic_write};
use serde::Serialize;

use crate::Result;
use crate::classify::QuarantineRule;

pub const LOG_FILE_NAME: &str = "processing_log.txt";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuarantineRecord {
    pub destination: PathBuf,
    /// Name of the archive whose content was quarantined.
    pub archive: String,
    pub depth: usize,
    pub rule: QuarantineRule,
    pub entries: Vec<String>,
}

pub fn directory_name(date: NaiveDate, base_name: &str) -> String {
    format!("{}-{base_name}", date.format("%Y%m%d"))
}

pub fn render_log(record: &QuarantineRecord, at: DateTime<Local>) -> String {
    let target = record
        .destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let entries: String = record
        .entries
        .iter()
        .map(|entry| format!("  {entry}\n"))
        .collect();

    format!(
        "kikoeru processing log\n\
         {separator}\n\
         Processed at: {at}\n\
         Original file: {archive}\n\
         Nesting depth: {depth}\n\
         Reason: {reason}\n\
         Target directory: {target}\n\
         \n\
         Entries:\n\
         {entries}\
         \n\
         This directory needs to be checked and sorted by hand.\n",
        separator = "=".repeat(50),
        at = at.format("%Y-%m-%d %H:%M:%S"),
        archive = record.archive,
        depth = record.depth,
        reason = record.rule,
    )
}

/// Write the log into the quarantine directory.
///
/// Call this before moving entries in, so an extracted entry sharing the
/// log's name is given a suffixed name instead of being replaced.
pub fn write_log(record: &QuarantineRecord, at: DateTime<Local>) -> Result<PathBuf> {
    let path = log_path(&record.destination);
    atomic_write(
        &path,
        render_log(record, at).as_bytes(),
        AtomicWriteOptions::new().sync(true),
    )?;
    Ok(path)
}

pub fn log_path(destination: &Path) -> PathBuf {
    destination.join(LOG_FILE_NAME)
}
