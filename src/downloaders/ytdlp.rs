use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::{tool_version, ToolRunner};
use super::{DownloadReport, DownloadRequest, MediaDownloader, MediaFormat};
use crate::config::YtDlpConfig;
use crate::output::{default_music_dir, OutputTemplate};
use crate::{utils, GrabError, Result};

/// Marker for lines printed right before a file is downloaded
const DOWNLOAD_MARKER: &str = "[tunegrab:download] ";

/// Marker for lines printed once a file reached its final path
const SAVED_MARKER: &str = "[tunegrab:saved] ";

/// What yt-dlp is producing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YtDlpProfile {
    /// Best audio, converted to MP3 at `quality` kbps
    Mp3 { quality: String },
    /// H.264 video + AAC audio merged into MP4
    Mp4 { format_selector: String },
}

/// A line of yt-dlp stdout
#[derive(Debug, Clone, PartialEq, Eq)]
enum YtDlpEvent {
    Downloading(String),
    Saved(PathBuf),
    Other(String),
}

fn parse_line(line: &str) -> YtDlpEvent {
    if let Some(name) = line.strip_prefix(DOWNLOAD_MARKER) {
        YtDlpEvent::Downloading(name.to_string())
    } else if let Some(path) = line.strip_prefix(SAVED_MARKER) {
        YtDlpEvent::Saved(PathBuf::from(path))
    } else {
        YtDlpEvent::Other(line.to_string())
    }
}

/// MP3 and MP4 downloads through yt-dlp
pub struct YtDlpDownloader {
    binary: String,
    profile: YtDlpProfile,
    show_progress: bool,
}

impl YtDlpDownloader {
    pub fn new(binary: impl Into<String>, profile: YtDlpProfile) -> Self {
        Self {
            binary: binary.into(),
            profile,
            show_progress: true,
        }
    }

    pub fn mp3(config: &YtDlpConfig) -> Self {
        Self::new(
            &config.binary,
            YtDlpProfile::Mp3 {
                quality: config.mp3_quality.clone(),
            },
        )
    }

    pub fn mp4(config: &YtDlpConfig) -> Self {
        Self::new(
            &config.binary,
            YtDlpProfile::Mp4 {
                format_selector: config.mp4_format.clone(),
            },
        )
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Template used when none is given on the command line
    pub fn default_template(format: MediaFormat, config: &YtDlpConfig) -> OutputTemplate {
        match format {
            MediaFormat::Mp3 => config
                .mp3_template
                .as_deref()
                .map(OutputTemplate::new)
                .unwrap_or_else(|| OutputTemplate::titled_in(&default_music_dir())),
            _ => OutputTemplate::new(&config.mp4_template),
        }
    }

    /// Template actually passed to yt-dlp
    pub fn resolved_template(&self, template: &OutputTemplate) -> OutputTemplate {
        match self.profile {
            YtDlpProfile::Mp3 { .. } => template.force_extension("mp3"),
            YtDlpProfile::Mp4 { .. } => template.clone(),
        }
    }

    fn progress_bar(&self) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        progress.enable_steady_tick(Duration::from_millis(120));
        Ok(progress)
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    fn tool_name(&self) -> &'static str {
        "yt-dlp"
    }

    fn format(&self) -> MediaFormat {
        match self.profile {
            YtDlpProfile::Mp3 { .. } => MediaFormat::Mp3,
            YtDlpProfile::Mp4 { .. } => MediaFormat::Mp4,
        }
    }

    fn install_hint(&self) -> &'static str {
        "Install with: pip install yt-dlp (https://github.com/yt-dlp/yt-dlp)"
    }

    async fn check_availability(&self) -> Result<String> {
        tool_version(&self.binary).await
    }

    fn build_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        match &self.profile {
            YtDlpProfile::Mp3 { quality } => {
                args.extend(
                    [
                        "--format",
                        "bestaudio/best",
                        "--extract-audio",
                        "--audio-format",
                        "mp3",
                        "--audio-quality",
                    ]
                    .map(String::from),
                );
                args.push(format!("{}K", quality));
            }
            YtDlpProfile::Mp4 { format_selector } => {
                args.push("--format".into());
                args.push(format_selector.clone());
                args.push("--merge-output-format".into());
                args.push("mp4".into());
            }
        }

        args.push("--output".into());
        args.push(self.resolved_template(&request.output).to_string());

        args.extend(["--quiet", "--no-warnings", "--no-simulate"].map(String::from));
        args.push("--print".into());
        args.push(format!("before_dl:{}%(filename)s", DOWNLOAD_MARKER));
        args.push("--print".into());
        args.push(format!("after_move:{}%(filepath)s", SAVED_MARKER));

        args.push(request.target.clone());
        args
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadReport> {
        if !utils::is_http_url(&request.target) {
            tracing::warn!(
                "'{}' is not an http(s) URL, passing it to yt-dlp as-is",
                request.target
            );
        }

        let args = self.build_args(request);
        let progress = self.progress_bar()?;
        progress.set_message(format!("Fetching {}...", request.target));

        let mut saved = Vec::new();
        let output = ToolRunner::new(&self.binary, &args)
            .run(|line| match parse_line(line) {
                YtDlpEvent::Downloading(name) => {
                    let message = format!("Downloading... {}", display_name(&name));
                    if progress.is_hidden() {
                        println!("{}", message);
                    } else {
                        progress.set_message(message);
                    }
                }
                YtDlpEvent::Saved(path) => saved.push(path),
                YtDlpEvent::Other(text) => tracing::debug!("yt-dlp: {}", text),
            })
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                progress.abandon_with_message("Download failed");
                return Err(e);
            }
        };

        if !output.status.success() {
            progress.abandon_with_message("Download failed");
            return Err(GrabError::ToolFailed {
                tool: self.tool_name().to_string(),
                code: output.status.code(),
                stderr: output.stderr_text(),
            }
            .into());
        }

        progress.finish_with_message("Download complete");

        let files: Vec<PathBuf> = saved.into_iter().filter(|path| path.exists()).collect();
        Ok(DownloadReport {
            created: files.clone(),
            files,
            warnings: false,
        })
    }
}

fn display_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|file| file.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
