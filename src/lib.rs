//! tunegrab - A Rust CLI tool for downloading music and video from streaming platforms
//!
//! This library wraps `yt-dlp` (MP3 audio, MP4 video) and `spotdl` (FLAC with metadata and
//! lyrics), handling output templates, output directories, retries and interactive prompts.

pub mod cli;
pub mod config;
pub mod downloaders;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use downloaders::{DownloadReport, DownloadRequest, MediaDownloader, MediaFormat};
pub use pipeline::{DownloadPipeline, RetryPolicy};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to tunegrab
#[derive(thiserror::Error, Debug)]
pub enum GrabError {
    #[error("{0} not found")]
    MissingTool(String),

    #[error("No permission to create/write to '{0}'")]
    PermissionDenied(std::path::PathBuf),

    #[error("{tool} exited with status {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Download failed - no files were created")]
    NoOutput,

    #[error("Rate limit detected")]
    RateLimited,

    #[error("{tool} timed out after {secs} seconds")]
    TimedOut { tool: String, secs: u64 },

    #[error("Download cancelled by user")]
    Cancelled,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

impl GrabError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GrabError::ToolFailed { .. }
                | GrabError::NoOutput
                | GrabError::RateLimited
                | GrabError::TimedOut { .. }
        )
    }

    /// Whether `error` is a user cancellation
    pub fn is_cancellation(error: &anyhow::Error) -> bool {
        matches!(error.downcast_ref::<GrabError>(), Some(GrabError::Cancelled))
    }
}
