//! Request-scoped source files
//!
//! Every uploaded or downloaded song lives in the incoming directory under a
//! unique name and is owned by a [`TempSource`]. Dropping the guard deletes the
//! file, so cleanup happens on every exit path of a request, including
//! cancellation when the client disconnects.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Owned temporary source file, deleted on drop
#[derive(Debug)]
pub struct TempSource {
    path: PathBuf,
}

impl TempSource {
    /// Reserve a unique path `<dir>/<uuid>.<extension>`
    ///
    /// The file itself is not created; whoever fills it writes to [`path`](Self::path).
    pub fn create(dir: &Path, extension: &str) -> Self {
        let extension = sanitize_extension(extension);
        Self {
            path: dir.join(format!("{}.{}", Uuid::new_v4(), extension)),
        }
    }

    /// Take ownership of an existing file
    pub fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempSource {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed temporary source");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove temporary source"
                );
            }
        }
    }
}

/// Extension derived from an uploaded filename, `mp3` when absent or odd
pub fn extension_from_filename(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(sanitize_extension)
        .unwrap_or_else(|| "mp3".to_string())
}

fn sanitize_extension(extension: &str) -> String {
    let clean: String = extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if clean.is_empty() {
        "mp3".to_string()
    } else {
        clean
    }
}

/// Remove every regular file directly inside `dir`
///
/// Run at startup to reclaim sources and cache files left by a crashed
/// process. A missing directory counts as empty.
pub fn sweep_orphans(dir: &Path) -> io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove orphan");
            }
        }
    }

    if removed > 0 {
        tracing::info!(dir = %dir.display(), removed, "Swept orphaned files");
    }
    Ok(removed)
}
