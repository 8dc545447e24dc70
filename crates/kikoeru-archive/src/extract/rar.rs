use std::ffi::OsString;
use std::path::{MAIN_SEPARATOR_STR, Path};
use std::process::{Command, Stdio};

use tracing::debug;
use walkdir::WalkDir;

use super::Extracted;
use crate::entry::{Entry, EntryKind};
use crate::error::{Error, Result};
use crate::sanitize::sanitize_path;

// unrar exit codes
const EXIT_CRC: i32 = 3;
const EXIT_BAD_PASSWORD: i32 = 11;

/// Run `unrar x` into `destination`, then list what it wrote.
///
pub(super) fn extract(
    archive: &Path,
    destination: &Path,
    password: Option<&str>,
    program: &Path,
) -> Result<Extracted> {
    let password = password.filter(|p| !p.is_empty());
    let tool = program.display().to_string();
    let mut command = Command::new(program);
    command
        .arg("x")
        .arg("-y")
        .arg("-idq")
        .arg(password_arg(password));
    let mut target = OsString::from(destination.as_os_str());
    target.push(MAIN_SEPARATOR_STR);
    command
        .arg("--")
        .arg(archive)
        .arg(target)
        .stdin(Stdio::null());

    debug!(%tool, archive = %archive.display(), "running unrar");
    let output = command.output().map_err(|e| Error::ExternalTool {
        tool: tool.clone(),
        status: None,
        stderr: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(match output.status.code() {
            Some(EXIT_BAD_PASSWORD) if password.is_none() => Error::PasswordRequired,
            Some(EXIT_BAD_PASSWORD) => Error::WrongPassword,
            Some(EXIT_CRC) if password.is_some() => Error::WrongPassword,
            status => Error::ExternalTool {
                tool,
                status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            },
        });
    }

    list_written(destination)
}

/// A bare `-p` makes unrar prompt on the terminal; `-p-` never prompts.
fn password_arg(password: Option<&str>) -> String {
    match password {
        Some(password) if !password.is_empty() => format!("-p{password}"),
        _ => "-p-".to_string(),
    }
}

fn list_written(destination: &Path) -> Result<Extracted> {
    let mut extracted = Extracted::default();
    for item in WalkDir::new(destination).min_depth(1).sort_by_file_name() {
        let item = item.map_err(|e| Error::Io(e.into()))?;
        let Ok(relative) = item.path().strip_prefix(destination) else {
            continue;
        };
        let sanitized = sanitize_path(relative, destination)?;
        let file_type = item.file_type();
        let (size, kind) = if file_type.is_dir() {
            (0, EntryKind::Directory)
        } else if file_type.is_file() {
            let size = item.metadata().map_err(|e| Error::Io(e.into()))?.len();
            (size, EntryKind::File)
        } else {
            continue;
        };
        extracted
            .entries
            .push(Entry::new(sanitized.relative, sanitized.resolved, size, kind));
    }
    Ok(extracted)
}
