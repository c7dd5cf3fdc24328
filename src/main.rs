use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunegrab::cli::{Cli, Commands};
use tunegrab::config::{Config, CredentialStore};
use tunegrab::downloaders::spotdl::SpotDlDownloader;
use tunegrab::downloaders::ytdlp::YtDlpDownloader;
use tunegrab::downloaders::{MediaDownloader, MediaFormat};
use tunegrab::output::OutputTemplate;
use tunegrab::pipeline::{DownloadPipeline, RetryPolicy};
use tunegrab::session::{Session, StdioPrompter};
use tunegrab::{utils, GrabError};

/// How long a cancelled command gets to stop its tool before we exit
const CANCEL_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "tunegrab=debug" } else { "tunegrab=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load()?;

    // Prompts block on stdin, so the command runs on its own task and Ctrl-C is
    // also watched from here. Aborting the task drops any running tool, which
    // kills it.
    let mut task = tokio::spawn(run(cli.command, config, cli.quiet));
    let outcome = tokio::select! {
        joined = &mut task => joined?,
        Ok(()) = tokio::signal::ctrl_c() => {
            task.abort();
            match tokio::time::timeout(CANCEL_GRACE, task).await {
                Ok(Ok(outcome)) => outcome,
                _ => Err(GrabError::Cancelled.into()),
            }
        }
    };

    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => match e.downcast_ref::<GrabError>() {
            Some(GrabError::MissingTool(_)) => std::process::exit(1),
            Some(GrabError::Cancelled) => {
                println!("\n\n⏹️ Download cancelled by user");
                std::process::exit(130);
            }
            _ => Err(e),
        },
    }
}

/// Run a command. `Ok(false)` means a download was attempted and failed.
async fn run(command: Commands, config: Config, quiet: bool) -> Result<bool> {
    // The only stdin reader in the process
    let mut prompter = StdioPrompter::stdio();

    match command {
        Commands::Mp3 {
            url,
            output,
            quality,
        } => {
            let mut ytdlp = config.ytdlp.clone();
            if let Some(quality) = quality {
                ytdlp.mp3_quality = quality.to_string();
            }

            let template = output
                .map(OutputTemplate::new)
                .unwrap_or_else(|| YtDlpDownloader::default_template(MediaFormat::Mp3, &ytdlp));
            let downloader = YtDlpDownloader::mp3(&ytdlp).with_progress(!quiet);

            require_tool(&downloader).await?;
            warn_missing_helpers().await;
            download(DownloadPipeline::new(Box::new(downloader), template), url, &mut prompter).await
        }
        Commands::Mp4 { url, output } => {
            let template = output
                .map(OutputTemplate::new)
                .unwrap_or_else(|| YtDlpDownloader::default_template(MediaFormat::Mp4, &config.ytdlp));
            let downloader = YtDlpDownloader::mp4(&config.ytdlp).with_progress(!quiet);

            require_tool(&downloader).await?;
            warn_missing_helpers().await;
            download(DownloadPipeline::new(Box::new(downloader), template), url, &mut prompter).await
        }
        Commands::Flac {
            url,
            output,
            resilient,
            attempts,
        } => {
            let output_dir = match output {
                Some(dir) => dir,
                None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            };
            let template = OutputTemplate::spotdl_in(&output_dir);

            let plain = SpotDlDownloader::new(&config.spotdl);
            require_tool(&plain).await?;

            let pipeline = if resilient {
                let store = CredentialStore::new(config.credentials_path()?);
                let custom = store.setup_interactive(&mut prompter)?;

                println!("\n💡 TIP: Search queries often work better than URLs!");
                println!("Example: 'Bad Bunny - Un Verano Sin Ti'");

                let resilient_config = &config.spotdl.resilient;
                let policy = RetryPolicy::new(
                    attempts.unwrap_or(resilient_config.attempts),
                    resilient_config.backoff_base(),
                );
                DownloadPipeline::new(
                    Box::new(SpotDlDownloader::resilient(&config.spotdl, custom)),
                    template,
                )
                .with_retry_policy(policy)
            } else {
                DownloadPipeline::new(Box::new(plain), template)
            };

            download(pipeline, url, &mut prompter).await
        }
        Commands::Credentials { show } => {
            let store = CredentialStore::new(config.credentials_path()?);
            if show {
                store.display()?;
            } else {
                store.setup_interactive(&mut prompter)?;
            }
            Ok(true)
        }
        Commands::Config => {
            config.display();
            Ok(true)
        }
    }
}

/// Download a single URL, or start an interactive session when none was given
async fn download(
    pipeline: DownloadPipeline,
    url: Option<String>,
    prompter: &mut StdioPrompter,
) -> Result<bool> {
    match url {
        Some(url) => match pipeline.run(&url, None).await {
            Err(e) if GrabError::is_cancellation(&e) => Err(e),
            result => Ok(pipeline.report(&result)),
        },
        None => {
            println!("{}", "=".repeat(50));
            println!(
                "🎵 tunegrab {} Downloader",
                pipeline.downloader().format().as_str().to_uppercase()
            );
            println!("{}", "=".repeat(50));

            let mut session = Session::new(&pipeline, prompter);
            session.print_intro()?;
            let completed = session.run().await?;
            tracing::debug!("Session finished with {} successful download(s)", completed);
            Ok(true)
        }
    }
}

/// Fail with `GrabError::MissingTool` when the wrapped executable is unusable
async fn require_tool(downloader: &dyn MediaDownloader) -> Result<()> {
    match downloader.check_availability().await {
        Ok(version) => {
            println!(
                "{} {} found: {}",
                style("✅").green(),
                downloader.tool_name(),
                version
            );
            Ok(())
        }
        Err(e) => {
            tracing::debug!("Availability check failed: {:#}", e);
            eprintln!(
                "{} {}",
                style("❌").red(),
                style(format!("{} not found!", downloader.tool_name())).red()
            );
            eprintln!("{}", downloader.install_hint());
            Err(GrabError::MissingTool(downloader.tool_name().to_string()).into())
        }
    }
}

/// Non-fatal warnings for helper tools
async fn warn_missing_helpers() {
    let missing = utils::check_dependencies().await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
