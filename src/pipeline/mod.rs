use std::future::Future;
use std::path::{Path, PathBuf};

use crate::downloaders::{DownloadReport, DownloadRequest, MediaDownloader};
use crate::output::{self, ensure_directory, OutputTemplate};
use crate::{utils, GrabError, Result};

pub mod retry;

pub use retry::{run_with_retries, RetryPolicy};

/// Runs downloads for one downloader: output preparation, retries and reporting
pub struct DownloadPipeline {
    downloader: Box<dyn MediaDownloader>,
    default_output: OutputTemplate,
    policy: RetryPolicy,
}

impl DownloadPipeline {
    pub fn new(downloader: Box<dyn MediaDownloader>, default_output: OutputTemplate) -> Self {
        Self {
            downloader,
            default_output,
            policy: RetryPolicy::once(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn downloader(&self) -> &dyn MediaDownloader {
        self.downloader.as_ref()
    }

    /// Output template for a request, optionally moved into another directory
    pub fn template_for(&self, output_dir: Option<&Path>) -> OutputTemplate {
        match output_dir {
            Some(dir) => self.default_output.in_directory(dir),
            None => self.default_output.clone(),
        }
    }

    /// Download one target, retrying according to the pipeline's policy.
    /// Ctrl-C stops the running tool and returns `GrabError::Cancelled`.
    pub async fn run(&self, target: &str, output_dir: Option<&Path>) -> Result<DownloadReport> {
        self.run_until(target, output_dir, interrupted()).await
    }

    /// Like `run`, but cancelled when `cancel` resolves. The tool process is
    /// killed when the in-flight attempt is dropped.
    pub async fn run_until<C>(
        &self,
        target: &str,
        output_dir: Option<&Path>,
        cancel: C,
    ) -> Result<DownloadReport>
    where
        C: Future<Output = ()>,
    {
        let template = self.template_for(output_dir);
        let location = template.parent_dir().unwrap_or_else(|| PathBuf::from("."));

        ensure_directory(&location)?;

        println!("🎵 Downloading to: {}", location.display());
        println!("📀 Format: {}", self.downloader.format().describe());
        println!("🎯 URL: {}", target);
        tracing::info!(
            "Starting {} download from {} with template {}",
            self.downloader.tool_name(),
            utils::extract_domain(target).unwrap_or_else(|| "search query".to_string()),
            template
        );

        let request = DownloadRequest::new(target, template);
        let downloader = self.downloader.as_ref();
        let policy = self.policy;

        let attempts = run_with_retries(policy, |attempt| {
            let request = request.with_attempt(attempt);
            async move {
                if policy.max_attempts > 1 {
                    println!("🚀 Starting download (attempt {})...", request.attempt);
                } else {
                    println!("🚀 Starting download...");
                }
                downloader.download(&request).await
            }
        });

        tokio::select! {
            result = attempts => result,
            () = cancel => {
                tracing::info!("Download of {} cancelled", target);
                Err(GrabError::Cancelled.into())
            }
        }
    }

    /// Print the outcome of `run`. Returns whether the download succeeded.
    pub fn report(&self, result: &Result<DownloadReport>) -> bool {
        match result {
            Ok(report) if report.warnings => {
                println!("\n⚠️ Download completed with warnings, but files were downloaded:");
                output::print_file_summary(&report.files);
                true
            }
            Ok(report) => {
                println!("\n🎉 Download completed successfully!");
                if !report.files.is_empty() {
                    println!("📁 Downloaded {} file(s)", report.files.len());
                    output::print_file_summary(&report.files);
                }
                if report.created.len() < report.files.len() {
                    tracing::info!(
                        "{} of {} file(s) already existed",
                        report.files.len() - report.created.len(),
                        report.files.len()
                    );
                }
                true
            }
            Err(e) => {
                match e.downcast_ref::<GrabError>() {
                    Some(GrabError::NoOutput) | Some(GrabError::RateLimited) => {
                        println!("\n❌ {}", GrabError::NoOutput);
                        println!("💡 Try one of these solutions:");
                        println!("   1. Wait a few minutes and try again (rate limiting)");
                        println!("   2. Try a different song");
                        println!("   3. Use a search query instead: 'Artist - Song Title'");
                    }
                    Some(GrabError::TimedOut { secs, .. }) => {
                        println!("\n❌ Download timed out (took longer than {} seconds)", secs);
                    }
                    Some(GrabError::PermissionDenied(dir)) => {
                        println!("\n❌ Error: No permission to create/write to '{}'.", dir.display());
                    }
                    _ => println!("\n❌ Download failed: {:#}", e),
                }
                false
            }
        }
    }
}

/// Resolves on Ctrl-C, never when the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
