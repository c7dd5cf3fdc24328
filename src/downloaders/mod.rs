use async_trait::async_trait;
use std::path::PathBuf;

pub mod process;
pub mod spotdl;
pub mod ytdlp;

use crate::output::OutputTemplate;
use crate::Result;

/// Target container/codec of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Mp3,
    Mp4,
    Flac,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Flac => "flac",
        }
    }

    /// Human readable description for status output
    pub fn describe(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "MP3 (audio)",
            MediaFormat::Mp4 => "MP4 (H.264 + AAC video)",
            MediaFormat::Flac => "FLAC (lossless)",
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single download: what to fetch and where to put it
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// URL, or a search query for tools that accept one
    pub target: String,

    /// Output path template handed to the tool
    pub output: OutputTemplate,

    /// 1-based attempt number
    pub attempt: u32,
}

impl DownloadRequest {
    pub fn new(target: impl Into<String>, output: OutputTemplate) -> Self {
        Self {
            target: target.into(),
            output,
            attempt: 1,
        }
    }

    pub fn with_attempt(&self, attempt: u32) -> Self {
        Self {
            attempt,
            ..self.clone()
        }
    }
}

/// What a finished download left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Matching files found in the output location after the call
    pub files: Vec<PathBuf>,

    /// Files that did not exist before the call
    pub created: Vec<PathBuf>,

    /// The tool exited non-zero but still produced files
    pub warnings: bool,
}

/// Trait for the external tools that perform downloads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Name of the wrapped executable
    fn tool_name(&self) -> &'static str;

    /// Format this downloader produces
    fn format(&self) -> MediaFormat;

    /// Hint printed when the tool is missing
    fn install_hint(&self) -> &'static str;

    /// Return the tool's version, or `GrabError::MissingTool`
    async fn check_availability(&self) -> Result<String>;

    /// Command-line arguments for a request
    fn build_args(&self, request: &DownloadRequest) -> Vec<String>;

    /// Run the tool for a request
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadReport>;
}

/// Executable shell scripts standing in for the wrapped tools
#[cfg(all(test, unix))]
pub(crate) mod fake_tool {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write `body` as an executable `sh` script named `name` inside `dir`
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs_err::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs_err::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
