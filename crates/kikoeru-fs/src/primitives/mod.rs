pub mod atomic_write;
pub mod copy_dir;
pub mod move_entry;
pub mod unique;

pub use atomic_write::{AtomicWriteOptions, atomic_write};
pub use copy_dir::copy_dir_all;
pub use move_entry::{move_entry, remove_entry};
pub use unique::unique_destination;
