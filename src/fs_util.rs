use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::HcpError;

/// Copies `source` over `dest` through a temp file in the destination
/// directory, carrying the modification time across. The rename replaces
/// any earlier copy in one step, so a failed copy leaves it untouched.
pub fn copy_file_preserving(source: &Path, dest: &Utf8Path) -> Result<(), HcpError> {
    let parent = dest
        .parent()
        .ok_or_else(|| HcpError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| HcpError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".hcp-prep-file")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HcpError::Filesystem(err.to_string()))?;
    fs::copy(source, temp.path()).map_err(|err| {
        HcpError::Filesystem(format!("copy {} to {dest}: {err}", source.display()))
    })?;
    let modified = fs::metadata(source)
        .and_then(|meta| meta.modified())
        .map_err(|err| HcpError::Filesystem(err.to_string()))?;
    temp.as_file()
        .set_modified(modified)
        .map_err(|err| HcpError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| HcpError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn is_symlink(path: &Utf8Path) -> bool {
    fs::symlink_metadata(path.as_std_path())
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Regular files directly inside `dir`, following symlinks, sorted by name.
pub fn list_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, HcpError> {
    let mut files = Vec::new();
    for entry in dir
        .read_dir_utf8()
        .map_err(|err| HcpError::Filesystem(format!("read {dir}: {err}")))?
    {
        let entry = entry.map_err(|err| HcpError::Filesystem(err.to_string()))?;
        let path = entry.path().to_path_buf();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn list_dirs(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, HcpError> {
    let mut dirs = Vec::new();
    for entry in dir
        .read_dir_utf8()
        .map_err(|err| HcpError::Filesystem(format!("read {dir}: {err}")))?
    {
        let entry = entry.map_err(|err| HcpError::Filesystem(err.to_string()))?;
        let path = entry.path().to_path_buf();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn dir_is_empty(dir: &Utf8Path) -> Result<bool, HcpError> {
    let mut entries = dir
        .read_dir_utf8()
        .map_err(|err| HcpError::Filesystem(format!("read {dir}: {err}")))?;
    Ok(entries.next().is_none())
}

/// True when `copy` exists and has the byte length of `source`.
pub fn same_size(source: &Utf8Path, copy: &Utf8Path) -> bool {
    match (
        fs::metadata(source.as_std_path()),
        fs::metadata(copy.as_std_path()),
    ) {
        (Ok(source), Ok(copy)) => copy.is_file() && source.len() == copy.len(),
        _ => false,
    }
}
