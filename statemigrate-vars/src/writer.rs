//! Owner-read-only variables-file writer.
//!
//! The file is written to `<name>.statemigrate.tmp` with mode `0400` and then
//! renamed over the final path, so a reader never sees a partial file and a
//! previous read-only file does not block the rewrite.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{write_err, VarsError};

pub const VARS_FILE_NAME: &str = "terraform.tfvars";

/// Write `content` to `<dir>/terraform.tfvars` and return the path.
pub fn write_vars_file(dir: &Path, content: &str) -> Result<PathBuf, VarsError> {
    let path = dir.join(VARS_FILE_NAME);
    let tmp = dir.join(format!("{VARS_FILE_NAME}.statemigrate.tmp"));

    // A tmp file left by an interrupted run is read-only and cannot be reopened.
    if tmp.exists() {
        std::fs::remove_file(&tmp).map_err(|e| write_err(&tmp, e))?;
    }

    let mut file = open_read_only_new(&tmp).map_err(|e| write_err(&tmp, e))?;
    if let Err(e) = file.write_all(content.as_bytes()).and_then(|_| file.sync_all()) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(&tmp, e));
    }
    drop(file);

    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(&path, e));
    }

    tracing::info!(path = %path.display(), bytes = content.len(), "wrote variables file");
    Ok(path)
}

#[cfg(unix)]
fn open_read_only_new(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o400)
        .open(path)
}

#[cfg(not(unix))]
fn open_read_only_new(path: &Path) -> std::io::Result<std::fs::File> {
    let file = std::fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    let mut perms = file.metadata()?.permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(path, perms)?;
    Ok(file)
}
