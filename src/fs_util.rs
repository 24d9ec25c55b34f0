use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;
use tempfile::NamedTempFile;

use crate::error::BidsError;

/// Replaces `path` with `content` via a temp file in the same directory, so a
/// crash mid-write leaves either the old file or the new one.
pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), BidsError> {
    let temp = stage(path, content)?;
    temp.persist(path.as_std_path())
        .map_err(|err| BidsError::Filesystem(format!("persist {path}: {err}")))?;
    Ok(())
}

/// Like [`write_atomic`] but never replaces an existing file. Returns `false`
/// when `path` was already present.
pub fn write_if_absent(path: &Utf8Path, content: &[u8]) -> Result<bool, BidsError> {
    if path.as_std_path().exists() {
        return Ok(false);
    }
    let temp = stage(path, content)?;
    match temp.persist_noclobber(path.as_std_path()) {
        Ok(_) => Ok(true),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(BidsError::Filesystem(format!("persist {path}: {}", err.error))),
    }
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), BidsError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| BidsError::Filesystem(format!("create {path}: {err}")))
}

fn stage(path: &Utf8Path, content: &[u8]) -> Result<NamedTempFile, BidsError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    ensure_dir(parent)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".dicom2bids")
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| BidsError::Filesystem(format!("temp file in {parent}: {err}")))?;
    temp.write_all(content)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|err| BidsError::Filesystem(format!("write {path}: {err}")))?;
    Ok(temp)
}
