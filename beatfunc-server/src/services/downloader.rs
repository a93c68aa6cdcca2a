//! Remote audio retrieval for `POST /yt`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use super::temp_files::TempSource;

/// Download errors
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloader exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Downloader produced no file at {0}")]
    MissingOutput(PathBuf),
}

/// Fetches the audio track of a remote video into a request-scoped file
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<TempSource, DownloadError>;
}

/// [`AudioDownloader`] backed by the `yt-dlp` command line tool
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    program: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<TempSource, DownloadError> {
        // Guard owns the final path from the start so partial output is cleaned up
        let target = TempSource::create(dest_dir, "mp3");
        let stem = target
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("download")
            .to_string();
        let template = dest_dir.join(format!("{}.%(ext)s", stem));

        tracing::info!(url = %url, program = %self.program.display(), "Downloading audio");

        let output = Command::new(&self.program)
            .arg("--extract-audio")
            .args(["--audio-format", "mp3", "--audio-quality", "192K"])
            .args(["--no-playlist", "--quiet", "--no-progress"])
            .arg("--output")
            .arg(&template)
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DownloadError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(url = %url, status = %output.status, stderr = %stderr, "Download failed");
            remove_partials(dest_dir, &stem).await;
            return Err(DownloadError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        if !tokio::fs::try_exists(target.path()).await.unwrap_or(false) {
            tracing::warn!(url = %url, path = %target.path().display(), "Download produced no output");
            remove_partials(dest_dir, &stem).await;
            return Err(DownloadError::MissingOutput(target.path().to_path_buf()));
        }

        tracing::info!(url = %url, path = %target.path().display(), "Download complete");
        Ok(target)
    }
}

/// Delete whatever a failed run left under `<stem>.*` (fragments, other containers)
async fn remove_partials(dir: &Path, stem: &str) {
    let prefix = format!("{}.", stem);
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to scan for partial downloads");
            return;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(&prefix) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => tracing::debug!(path = %entry.path().display(), "Removed partial download"),
            Err(e) => tracing::warn!(
                path = %entry.path().display(),
                error = %e,
                "Failed to remove partial download"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let temp_dir = TempDir::new().unwrap();
        let downloader = YtDlpDownloader::new("/nonexistent/yt-dlp-binary");

        let err = downloader
            .download("https://example.invalid/watch?v=x", temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_program_reports_status() {
        let temp_dir = TempDir::new().unwrap();
        let downloader = YtDlpDownloader::new("false");

        let err = downloader
            .download("https://example.invalid/watch?v=x", temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Failed { .. }));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_file_is_missing_output() {
        let temp_dir = TempDir::new().unwrap();
        let downloader = YtDlpDownloader::new("true");

        let err = downloader
            .download("https://example.invalid/watch?v=x", temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::MissingOutput(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_run_leaves_no_fragments() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let bin_dir = TempDir::new().unwrap();
        let script = bin_dir.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            r#"#!/bin/sh
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done
touch "$(echo "$out" | sed 's/%(ext)s/webm.part/')"
touch "$(echo "$out" | sed 's/%(ext)s/m4a/')"
exit 1
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Unrelated files in the directory survive
        let bystander = temp_dir.path().join("other.mp3");
        std::fs::write(&bystander, b"keep").unwrap();

        let downloader = YtDlpDownloader::new(script.clone());
        let err = downloader
            .download("https://example.invalid/watch?v=x", temp_dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Failed { .. }));
        let remaining: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(remaining, vec![bystander]);
    }
}
