use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tunegrab",
    about = "tunegrab - Download music and video as MP3, MP4 or FLAC using yt-dlp and spotdl",
    version,
    long_about = "A CLI tool that wraps yt-dlp and spotdl to fetch content from YouTube, Spotify and other streaming URLs and transcode it locally. Run a subcommand without a URL to enter interactive mode."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the best available audio and convert it to MP3 (yt-dlp)
    Mp3 {
        /// URL to download (prompts when omitted)
        #[arg(value_name = "URL")]
        url: Option<String>,

        /// Output template, e.g. "music/%(title)s.%(ext)s" (defaults to the Music directory)
        #[arg(short, long, value_name = "TEMPLATE")]
        output: Option<String>,

        /// MP3 bitrate in kbps
        #[arg(long, value_name = "KBPS", value_parser = clap::value_parser!(u32).range(1..))]
        quality: Option<u32>,
    },

    /// Download H.264/AAC video merged into MP4 (yt-dlp)
    Mp4 {
        /// URL to download (prompts when omitted)
        #[arg(value_name = "URL")]
        url: Option<String>,

        /// Output template (defaults to "%(title)s.%(ext)s" in the current directory)
        #[arg(short, long, value_name = "TEMPLATE")]
        output: Option<String>,
    },

    /// Download lossless FLAC with metadata and lyrics (spotdl)
    Flac {
        /// Spotify URL or search query such as 'Artist - Song Title' (prompts when omitted)
        #[arg(value_name = "URL_OR_QUERY")]
        url: Option<String>,

        /// Output directory (defaults to the current directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Rate-limit friendly mode: custom credentials, timeout and retries with backoff
        #[arg(long)]
        resilient: bool,

        /// Number of attempts in resilient mode
        #[arg(long, value_name = "COUNT", requires = "resilient")]
        attempts: Option<u32>,
    },

    /// Show or set up Spotify client credentials used by spotdl
    Credentials {
        /// Show the stored credentials without prompting
        #[arg(short, long)]
        show: bool,
    },

    /// Show current configuration
    Config,
}
