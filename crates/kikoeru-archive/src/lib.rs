//! Archive extraction with password support and path sanitization.
//!
//! # Architecture
//!
//! - `format.rs` - Format detection by extension and magic bytes
//! - `sanitize.rs` - Path sanitization (zip-slip prevention)
//! - `entry.rs` - What an extraction wrote to disk
//! - `extract/` - The [`ArchiveExtractor`] seam and per-format implementations

pub use entry::{ArchiveReport, Entry, EntryKind};
pub use error::{Error, Result};
pub use extract::{ArchiveExtractor, NativeExtractor, is_archive_path};
pub use format::{ArchiveFormat, TarCompress};
pub use options::ExtractOptions;
pub use sanitize::{SanitizedPath, sanitize_path};

pub mod entry;
mod error;
pub mod extract;
pub mod format;
mod options;
mod sanitize;
