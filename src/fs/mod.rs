//! Filesystem helpers shared by the stores: path normalization, moves that
//! survive device boundaries, and atomic JSON document writes.

use std::{
    ffi::OsString,
    fs, io,
    path::{Component, Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Canonicalize `path`, tolerating a missing tail.
///
/// Deleted files cannot be canonicalized, so the deepest existing ancestor is
/// canonicalized and the missing components are re-attached. A path seen while
/// it existed and the same path seen after deletion normalize identically.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canon) = path.canonicalize() {
        return canon;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut missing: Vec<OsString> = Vec::new();
    let mut cursor = absolute.as_path();
    loop {
        if let Ok(canon) = cursor.canonicalize() {
            let mut out = canon;
            for part in missing.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (cursor.parent(), cursor.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                cursor = parent;
            }
            _ => return lexical_clean(&absolute),
        }
    }
}

fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Move a file, falling back to copy + delete when `rename` crosses devices.
///
/// The fallback is not crash-safe: a crash between the copy and the delete
/// leaves the file in both places.
pub fn move_file(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) if err.raw_os_error() == Some(libc::EXDEV) => {
            debug!(src = %src.display(), dst = %dst.display(), "rename crosses devices; copying");
            fs::copy(src, dst).map_err(Error::Io)?;
            if let Err(err) = fs::remove_file(src) {
                warn!(src = %src.display(), error = %err, "copy succeeded but source removal failed");
                let _ = fs::remove_file(dst);
                return Err(Error::Io(err).into());
            }
            Ok(())
        }
        Err(err) => Err(Error::Io(err).into()),
    }
}

/// Sibling path used while writing `path` atomically.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as pretty JSON and replace `path` with it atomically.
pub fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    let tmp = temp_path_for(path);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a persisted document, `None` when it does not exist yet.
pub fn read_document(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::Io(err).into()),
    }
}

/// Remove empty directories from `start` upwards, stopping after `stop_at`.
///
/// Best-effort: the first directory that cannot be removed (non-empty or
/// otherwise) ends the walk. `stop_at` itself is removed when empty.
pub fn remove_empty_dirs(start: &Path, stop_at: &Path) {
    if !start.starts_with(stop_at) {
        return;
    }
    let mut cursor = Some(start);
    while let Some(dir) = cursor {
        if fs::remove_dir(dir).is_err() {
            break;
        }
        if dir == stop_at {
            break;
        }
        cursor = dir.parent();
    }
}
