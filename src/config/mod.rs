use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod credentials;

pub use credentials::{CredentialStore, SpotifyCredentials};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// yt-dlp settings (MP3 and MP4 downloads)
    pub ytdlp: YtDlpConfig,

    /// spotdl settings (FLAC downloads)
    pub spotdl: SpotDlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// Executable name or path
    pub binary: String,

    /// MP3 bitrate in kbps
    pub mp3_quality: String,

    /// Output template for MP3 downloads (Music directory when unset)
    pub mp3_template: Option<String>,

    /// Output template for MP4 downloads
    pub mp4_template: String,

    /// Format selector for MP4 downloads
    pub mp4_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotDlConfig {
    /// Executable name or path
    pub binary: String,

    /// Bitrate passed to spotdl ("disable" keeps the source quality)
    pub bitrate: String,

    /// Audio providers, tried in order
    pub audio_providers: Vec<String>,

    /// Lyrics providers, tried in order
    pub lyrics_providers: Vec<String>,

    /// Write .lrc files next to the audio
    pub generate_lrc: bool,

    /// Overwrite policy for existing files
    pub overwrite: String,

    /// Per-track retries inside spotdl
    pub max_retries: u32,

    /// Download threads inside spotdl
    pub threads: u32,

    /// spotdl config file holding client credentials (~/.spotdl/config.json when unset)
    pub credentials_file: Option<PathBuf>,

    /// Settings for rate-limit friendly downloads
    pub resilient: ResilientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilientConfig {
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub attempts: u32,
    pub backoff_base_secs: u64,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            mp3_quality: "192".to_string(),
            mp3_template: None,
            mp4_template: "%(title)s.%(ext)s".to_string(),
            mp4_format: "bestvideo[ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]/best[ext=mp4]"
                .to_string(),
        }
    }
}

impl Default for SpotDlConfig {
    fn default() -> Self {
        Self {
            binary: "spotdl".to_string(),
            bitrate: "disable".to_string(),
            audio_providers: vec![
                "youtube-music".to_string(),
                "youtube".to_string(),
                "soundcloud".to_string(),
            ],
            lyrics_providers: vec![
                "genius".to_string(),
                "azlyrics".to_string(),
                "musixmatch".to_string(),
            ],
            generate_lrc: true,
            overwrite: "skip".to_string(),
            max_retries: 5,
            threads: 1,
            credentials_file: None,
            resilient: ResilientConfig::default(),
        }
    }
}

impl Default for ResilientConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            timeout_secs: 600,
            attempts: 3,
            backoff_base_secs: 60,
        }
    }
}

impl ResilientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            if let Err(e) = config.save_to(&config_path) {
                // A read-only home should not stop downloads
                tracing::warn!("Could not write default config: {:#}", e);
            }
            Ok(config)
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("tunegrab").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.ytdlp.binary.trim().is_empty() || self.spotdl.binary.trim().is_empty() {
            anyhow::bail!("Downloader binaries must not be empty");
        }

        if self.ytdlp.mp3_quality.parse::<u32>().is_err() {
            anyhow::bail!("ytdlp.mp3_quality must be a bitrate in kbps, got '{}'", self.ytdlp.mp3_quality);
        }

        if self.spotdl.audio_providers.is_empty() {
            anyhow::bail!("At least one spotdl audio provider must be configured");
        }

        if self.spotdl.threads == 0 {
            anyhow::bail!("spotdl.threads must be at least 1");
        }

        if self.spotdl.resilient.attempts == 0 {
            anyhow::bail!("spotdl.resilient.attempts must be at least 1");
        }

        Ok(())
    }

    /// Path of the spotdl credentials file
    pub fn credentials_path(&self) -> Result<PathBuf> {
        match &self.spotdl.credentials_file {
            Some(path) => Ok(path.clone()),
            None => CredentialStore::default_path(),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        if let Ok(path) = Self::config_path() {
            println!("  Config File: {}", path.display());
        }
        println!("  yt-dlp: {}", self.ytdlp.binary);
        println!("  MP3 Quality: {} kbps", self.ytdlp.mp3_quality);
        match &self.ytdlp.mp3_template {
            Some(template) => println!("  MP3 Template: {}", template),
            None => println!("  MP3 Template: <Music directory>/%(title)s.%(ext)s"),
        }
        println!("  MP4 Template: {}", self.ytdlp.mp4_template);
        println!("  spotdl: {}", self.spotdl.binary);
        println!("  Audio Providers: {}", self.spotdl.audio_providers.join(", "));
        println!("  Lyrics Providers: {}", self.spotdl.lyrics_providers.join(", "));
        println!("  Max Retries: {}", self.spotdl.max_retries);
        println!("  Threads: {}", self.spotdl.threads);
        println!(
            "  Resilient Mode: {} attempts, {}s backoff base, {}s timeout",
            self.spotdl.resilient.attempts,
            self.spotdl.resilient.backoff_base_secs,
            self.spotdl.resilient.timeout_secs
        );
    }
}
