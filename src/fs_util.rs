// src/fs_util.rs
//
// Plain directory mechanics used by the sweep: recursive copy, and removal of
// trees that may contain read-only files (the solver and some copy tools leave
// them behind, and `remove_dir_all` fails on them on Windows).

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Error, IoContext, Result};

fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let path = e.path().unwrap_or(root).to_path_buf();
    Error::io(path, e.into())
}

/// Copy `src` into `dst` recursively. `dst` is created if missing.
/// Symlinks are followed, so a linked directory is copied as a directory.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::io(entry.path(), std::io::ErrorKind::InvalidInput.into()))?;
        let to = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&to).at(&to)?;
        } else {
            fs::copy(entry.path(), &to).at(entry.path())?;
        }
    }
    Ok(())
}

fn clear_readonly(dir: &Path) -> Result<()> {
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if entry.path_is_symlink() {
            continue;
        }
        let path = entry.path();
        let mut perms = entry.metadata().map_err(|e| walk_error(dir, e))?.permissions();
        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            fs::set_permissions(path, perms).at(path)?;
        }
    }
    Ok(())
}

/// Remove a directory tree, making read-only entries writable first.
pub fn remove_dir_forced(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(_) => {
            clear_readonly(dir)?;
            fs::remove_dir_all(dir).at(dir)
        }
    }
}
