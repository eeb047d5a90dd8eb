//! Filesystem helpers shared by the build assembler and every uploader.

use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A regular file found under a walked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Absolute (or root-relative, matching the input) path on disk.
    pub path: PathBuf,
    /// Path relative to the root with `/` separators; used as the object key.
    pub key: String,
}

fn join_error(e: tokio::task::JoinError) -> io::Error {
    io::Error::other(format!("spawn_blocking failed: {e}"))
}

/// Recursively list every regular file under `root`, sorted by key.
pub async fn walk_dir(root: impl AsRef<Path>) -> io::Result<Vec<WalkedFile>> {
    let root = root.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || walk_dir_sync(&root))
        .await
        .map_err(join_error)?
}

fn walk_dir_sync(root: &Path) -> io::Result<Vec<WalkedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(WalkedFile {
            path: entry.path().to_path_buf(),
            key,
        });
    }
    files.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(files)
}

/// Content type for an object key, falling back to `application/octet-stream`.
pub fn guess_content_type(path: impl AsRef<Path>) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Copy every file under `src` into `dst`, creating directories as needed.
///
/// Fails if `src` does not exist.
pub async fn copy_dir_recursive(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> io::Result<u64> {
    let src = src.as_ref().to_path_buf();
    let dst = dst.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || copy_dir_sync(&src, &dst))
        .await
        .map_err(join_error)?
}

fn copy_dir_sync(src: &Path, dst: &Path) -> io::Result<u64> {
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source directory {} does not exist", src.display()),
        ));
    }
    std::fs::create_dir_all(dst)?;
    let mut copied = 0;
    for file in walk_dir_sync(src)? {
        let target = dst.join(&file.key);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&file.path, &target)?;
        copied += 1;
    }
    Ok(copied)
}

/// Remove `dir` and everything below it; a missing directory is not an error.
pub async fn remove_dir_if_exists(dir: impl AsRef<Path>) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir.as_ref()).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
