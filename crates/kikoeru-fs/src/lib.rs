//! Filesystem primitives used while organizing extracted uploads.
//!
//! # Architecture
//!
//! - `primitives/` - atomic writes, collision-free moves, removal
//! - `workspace.rs` - hidden staging directories inside the working directory
//! - `footprint.rs` - size signatures used for upload-stability checks

pub use error::{Error, Result};
pub use footprint::Footprint;
pub use primitives::{
    AtomicWriteOptions, atomic_write, copy_dir_all, move_entry, remove_entry, unique_destination,
};
pub use workspace::Staging;

mod error;
mod footprint;
pub mod primitives;
mod workspace;
