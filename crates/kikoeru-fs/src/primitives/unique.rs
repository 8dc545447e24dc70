use std::path::{Path, PathBuf};

/// Pick a free destination for `name` inside `dir`.
///
/// Returns `dir/name` when nothing exists there yet, otherwise the first free
/// `dir/name_1`, `dir/name_2`, ...
pub fn unique_destination(dir: impl AsRef<Path>, name: &str) -> PathBuf {
    let dir = dir.as_ref();
    let candidate = dir.join(name);
    if !exists(&candidate) {
        return candidate;
    }

    (1u32..)
        .map(|n| dir.join(format!("{name}_{n}")))
        .find(|p| !exists(p))
        .unwrap_or(candidate)
}

fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
