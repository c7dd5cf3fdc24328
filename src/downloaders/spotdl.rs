use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::process::{tool_version, ToolRunner};
use super::{DownloadReport, DownloadRequest, MediaDownloader, MediaFormat};
use crate::config::SpotDlConfig;
use crate::output::DirectorySnapshot;
use crate::{GrabError, Result};

/// FLAC downloads through spotdl
pub struct SpotDlDownloader {
    binary: String,
    bitrate: String,
    audio_providers: Vec<String>,
    lyrics_providers: Vec<String>,
    generate_lrc: bool,
    overwrite: String,
    max_retries: u32,
    threads: u32,
    print_errors: bool,
    use_config_file: bool,
    timeout: Option<Duration>,
}

impl SpotDlDownloader {
    /// Plain profile: spotdl's own retries, errors printed, no timeout
    pub fn new(config: &SpotDlConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            bitrate: config.bitrate.clone(),
            audio_providers: config.audio_providers.clone(),
            lyrics_providers: config.lyrics_providers.clone(),
            generate_lrc: config.generate_lrc,
            overwrite: config.overwrite.clone(),
            max_retries: config.max_retries,
            threads: config.threads,
            print_errors: true,
            use_config_file: false,
            timeout: None,
        }
    }

    /// Rate-limit friendly profile: more per-track retries, a bounded call,
    /// and spotdl's config file when it holds custom credentials
    pub fn resilient(config: &SpotDlConfig, use_config_file: bool) -> Self {
        Self {
            max_retries: config.resilient.max_retries,
            print_errors: false,
            use_config_file,
            timeout: Some(config.resilient.timeout()),
            ..Self::new(config)
        }
    }

    /// Directory the files land in
    fn output_dir(request: &DownloadRequest) -> PathBuf {
        request
            .output
            .parent_dir()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Decide the outcome of a call from its exit status and the files it left.
fn classify(
    success: bool,
    exit_code: Option<i32>,
    stderr: &str,
    files: Vec<PathBuf>,
    created: Vec<PathBuf>,
) -> std::result::Result<DownloadReport, GrabError> {
    if !files.is_empty() {
        return Ok(DownloadReport {
            files,
            created,
            warnings: !success,
        });
    }

    if stderr.to_lowercase().contains("rate limit") || exit_code == Some(1) {
        Err(GrabError::RateLimited)
    } else {
        Err(GrabError::NoOutput)
    }
}

#[async_trait]
impl MediaDownloader for SpotDlDownloader {
    fn tool_name(&self) -> &'static str {
        "spotdl"
    }

    fn format(&self) -> MediaFormat {
        MediaFormat::Flac
    }

    fn install_hint(&self) -> &'static str {
        "Install with: pip install spotdl"
    }

    async fn check_availability(&self) -> Result<String> {
        tool_version(&self.binary).await
    }

    fn build_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args = vec![
            "download".to_string(),
            request.target.clone(),
            "--format".to_string(),
            MediaFormat::Flac.as_str().to_string(),
            "--bitrate".to_string(),
            self.bitrate.clone(),
            "--output".to_string(),
            request.output.to_string(),
        ];

        if !self.audio_providers.is_empty() {
            args.push("--audio".into());
            args.extend(self.audio_providers.iter().cloned());
        }
        if !self.lyrics_providers.is_empty() {
            args.push("--lyrics".into());
            args.extend(self.lyrics_providers.iter().cloned());
        }
        if self.generate_lrc {
            args.push("--generate-lrc".into());
        }

        args.push("--overwrite".into());
        args.push(self.overwrite.clone());

        if self.print_errors {
            args.push("--print-errors".into());
        }

        args.push("--max-retries".into());
        args.push(self.max_retries.to_string());
        args.push("--threads".into());
        args.push(self.threads.to_string());

        if self.use_config_file {
            args.push("--config".into());
        }

        args
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadReport> {
        let output_dir = Self::output_dir(request);
        let snapshot = DirectorySnapshot::take(&output_dir, MediaFormat::Flac.as_str())?;

        let args = self.build_args(request);
        let output = ToolRunner::new(&self.binary, &args)
            .timeout(self.timeout)
            .echo_stderr(true)
            .run(|line| println!("{}", line))
            .await?;

        let (files, created) = snapshot.diff()?;
        tracing::debug!(
            "spotdl exited with {:?}: {} flac file(s), {} new",
            output.status.code(),
            files.len(),
            created.len()
        );

        classify(
            output.status.success(),
            output.status.code(),
            &output.stderr_text(),
            files,
            created,
        )
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpotDlConfig;
    use crate::output::OutputTemplate;
    use std::path::Path;

    fn request() -> DownloadRequest {
        DownloadRequest::new(
            "https://open.spotify.com/track/123",
            OutputTemplate::spotdl_in(Path::new("songs")),
        )
    }

    fn values_after(args: &[String], flag: &str, count: usize) -> Vec<String> {
        let start = args.iter().position(|arg| arg == flag).unwrap() + 1;
        args[start..start + count].to_vec()
    }

    #[test]
    fn test_plain_args() {
        let args = SpotDlDownloader::new(&SpotDlConfig::default()).build_args(&request());

        assert_eq!(args[0], "download");
        assert_eq!(args[1], "https://open.spotify.com/track/123");
        assert_eq!(values_after(&args, "--format", 1), ["flac"]);
        assert_eq!(values_after(&args, "--bitrate", 1), ["disable"]);
        assert!(values_after(&args, "--output", 1)[0].ends_with("{artists} - {title}.{output-ext}"));
        assert_eq!(
            values_after(&args, "--audio", 3),
            ["youtube-music", "youtube", "soundcloud"]
        );
        assert_eq!(
            values_after(&args, "--lyrics", 3),
            ["genius", "azlyrics", "musixmatch"]
        );
        assert!(args.contains(&"--generate-lrc".to_string()));
        assert_eq!(values_after(&args, "--overwrite", 1), ["skip"]);
        assert!(args.contains(&"--print-errors".to_string()));
        assert_eq!(values_after(&args, "--max-retries", 1), ["5"]);
        assert_eq!(values_after(&args, "--threads", 1), ["1"]);
        assert!(!args.contains(&"--config".to_string()));
    }

    #[test]
    fn test_resilient_args() {
        let args = SpotDlDownloader::resilient(&SpotDlConfig::default(), true).build_args(&request());

        assert_eq!(values_after(&args, "--max-retries", 1), ["10"]);
        assert!(args.contains(&"--config".to_string()));
        assert!(!args.contains(&"--print-errors".to_string()));
    }

    #[test]
    fn test_resilient_has_timeout() {
        let downloader = SpotDlDownloader::resilient(&SpotDlConfig::default(), false);
        assert_eq!(downloader.timeout, Some(Duration::from_secs(600)));
        assert_eq!(SpotDlDownloader::new(&SpotDlConfig::default()).timeout, None);
    }

    #[test]
    fn test_classify_outcomes() {
        let file = vec![PathBuf::from("a.flac")];

        let ok = classify(true, Some(0), "", file.clone(), file.clone()).unwrap();
        assert!(!ok.warnings);

        let warned = classify(false, Some(2), "", file.clone(), vec![]).unwrap();
        assert!(warned.warnings);

        assert!(matches!(
            classify(false, Some(1), "", vec![], vec![]),
            Err(GrabError::RateLimited)
        ));
        assert!(matches!(
            classify(false, Some(2), "HTTP 429: Rate Limit exceeded", vec![], vec![]),
            Err(GrabError::RateLimited)
        ));
        assert!(matches!(
            classify(true, Some(0), "", vec![], vec![]),
            Err(GrabError::NoOutput)
        ));
    }

    #[test]
    fn test_output_dir_from_template() {
        assert_eq!(SpotDlDownloader::output_dir(&request()), PathBuf::from("songs"));
    }

    #[cfg(unix)]
    mod fake_spotdl {
        use super::*;
        use crate::downloaders::fake_tool;

        /// A spotdl stand-in running `body`, and a request into `<tmp>/music`
        fn setup(body: &str) -> (tempfile::TempDir, SpotDlDownloader, DownloadRequest) {
            let dir = tempfile::tempdir().unwrap();
            let music = dir.path().join("music");
            fs_err::create_dir(&music).unwrap();

            let body = body.replace("$MUSIC", &music.display().to_string());
            let tool = fake_tool::script(dir.path(), "spotdl", &body);
            let config = SpotDlConfig {
                binary: tool.display().to_string(),
                ..SpotDlConfig::default()
            };
            let request = DownloadRequest::new("Artist - Song", OutputTemplate::spotdl_in(&music));
            (dir, SpotDlDownloader::new(&config), request)
        }

        #[tokio::test]
        async fn test_download_reports_new_flac() {
            let (dir, downloader, request) = setup(
                "echo \"$@\" > \"$MUSIC/../args\"\n\
                 printf 'caf\\351 warning\\n' >&2\n\
                 touch \"$MUSIC/Artist - Song.flac\"",
            );

            let report = downloader.download(&request).await.unwrap();

            let song = dir.path().join("music").join("Artist - Song.flac");
            assert_eq!(report.files, vec![song.clone()]);
            assert_eq!(report.created, vec![song]);
            assert!(!report.warnings);

            let args = fs_err::read_to_string(dir.path().join("args")).unwrap();
            assert!(args.starts_with("download Artist - Song --format flac"));
        }

        #[tokio::test]
        async fn test_download_with_errors_but_files_warns() {
            let (_dir, downloader, request) = setup(
                "touch \"$MUSIC/One.flac\"\necho 'LookupError: No results found for song: Two' >&2\nexit 2",
            );

            let report = downloader.download(&request).await.unwrap();
            assert_eq!(report.files.len(), 1);
            assert!(report.warnings);
        }

        #[tokio::test]
        async fn test_existing_files_count_as_success() {
            let (dir, downloader, request) = setup("echo 'Skipping Artist - Song (file already exists)'");
            fs_err::write(dir.path().join("music").join("Artist - Song.flac"), b"x").unwrap();

            let report = downloader.download(&request).await.unwrap();
            assert_eq!(report.files.len(), 1);
            assert!(report.created.is_empty());
        }

        #[tokio::test]
        async fn test_exit_one_without_files_is_rate_limited() {
            let (_dir, downloader, request) = setup("echo 'HTTP Error for GET' >&2\nexit 1");

            let err = downloader.download(&request).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<GrabError>(),
                Some(GrabError::RateLimited)
            ));
        }

        #[tokio::test]
        async fn test_clean_exit_without_files_is_no_output() {
            let (_dir, downloader, request) = setup("echo 'Found 0 songs'");

            let err = downloader.download(&request).await.unwrap_err();
            assert!(matches!(err.downcast_ref::<GrabError>(), Some(GrabError::NoOutput)));
        }
    }
}
