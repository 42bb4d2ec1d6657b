//! Video acquisition
//!
//! The engine needs a local, seekable file. A `VideoFetcher` turns whatever
//! the user supplied into one; downloaded files are flagged temporary so the
//! pipeline can remove them afterwards.

use std::path::PathBuf;
use std::process::Command;
use anyhow::{bail, Context};
use tracing::{info, instrument};

/// A video ready for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedVideo {
    pub path: PathBuf,
    /// Whether the file was created by the fetch and should be cleaned up
    pub temporary: bool,
}

pub trait VideoFetcher {
    fn fetch(&self, locator: &str, content_name: &str) -> anyhow::Result<FetchedVideo>;
}

/// Uses a video that already exists on disk; never deletes it
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFile;

impl VideoFetcher for LocalFile {
    fn fetch(&self, locator: &str, _content_name: &str) -> anyhow::Result<FetchedVideo> {
        let path = PathBuf::from(locator);
        if !path.is_file() {
            bail!("{} is not a readable video file", locator);
        }
        Ok(FetchedVideo { path, temporary: false })
    }
}

/// Downloads a remote video with the `yt-dlp` tool
///
/// One attempt, no retries; the file lands in `download_dir` as
/// `<content_name>.mp4`.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    download_dir: PathBuf,
}

impl YtDlp {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            download_dir: download_dir.into(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn target(&self, content_name: &str) -> PathBuf {
        self.download_dir.join(format!("{}.mp4", content_name))
    }
}

impl VideoFetcher for YtDlp {
    #[instrument(skip(self))]
    fn fetch(&self, locator: &str, content_name: &str) -> anyhow::Result<FetchedVideo> {
        std::fs::create_dir_all(&self.download_dir)
            .with_context(|| format!("creating {}", self.download_dir.display()))?;
        let target = self.target(content_name);

        info!("Downloading {} to {}", locator, target.display());
        let output = Command::new(&self.binary)
            .args(["-f", "best[ext=mp4]/best", "--no-playlist", "--merge-output-format", "mp4", "-o"])
            .arg(&target)
            .arg(locator)
            .output()
            .with_context(|| format!("launching {}", self.binary))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if !target.is_file() {
            bail!("{} reported success but {} is missing", self.binary, target.display());
        }

        Ok(FetchedVideo { path: target, temporary: true })
    }
}

/// Whether a locator names a remote resource rather than a local path
pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Remove a fetched video if the fetch created it
pub fn cleanup(video: &FetchedVideo) -> std::io::Result<bool> {
    if video.temporary && video.path.exists() {
        std::fs::remove_file(&video.path)?;
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_file_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp4");
        std::fs::write(&path, b"bytes").unwrap();

        let fetched = LocalFile.fetch(path.to_str().unwrap(), "talk").unwrap();
        assert_eq!(fetched.path, path);
        assert!(!fetched.temporary);

        assert!(!cleanup(&fetched).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_local_file_missing() {
        assert!(LocalFile.fetch("/definitely/not/here.mp4", "x").is_err());
    }

    #[test]
    fn test_cleanup_removes_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download.mp4");
        std::fs::write(&path, b"bytes").unwrap();

        let fetched = FetchedVideo { path: path.clone(), temporary: true };
        assert!(cleanup(&fetched).unwrap());
        assert!(!path.exists());
        assert!(!cleanup(&fetched).unwrap());
    }

    #[test]
    fn test_missing_downloader_binary() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = YtDlp::new(dir.path()).with_binary("definitely-not-yt-dlp");
        let err = fetcher.fetch("https://example.com/watch?v=abc", "lecture").unwrap_err();
        assert!(format!("{:#}", err).contains("definitely-not-yt-dlp"));
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://www.youtube.com/watch?v=abc"));
        assert!(is_remote("http://example.com/a.mp4"));
        assert!(!is_remote("lecture.mp4"));
        assert!(!is_remote("/videos/https.mp4"));
    }
}
