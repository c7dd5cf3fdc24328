use anyhow::Context;
use std::fmt::Display;
use std::io::{BufRead, BufReader, Stdin, Stdout, Write};
use std::path::PathBuf;

use crate::downloaders::MediaFormat;
use crate::pipeline::DownloadPipeline;
use crate::{GrabError, Result};

const QUIT_WORDS: [&str; 3] = ["quit", "q", "exit"];
const AFFIRMATIVE_WORDS: [&str; 5] = ["y", "yes", "s", "si", "sí"];

pub fn is_quit(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    QUIT_WORDS.contains(&input.as_str())
}

pub fn is_affirmative(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    AFFIRMATIVE_WORDS.contains(&input.as_str())
}

/// Line-oriented prompts over any reader/writer pair
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

/// Prompter over the process's stdin/stdout. Create one per process: its
/// buffer reads ahead, so a second reader would miss piped input.
pub type StdioPrompter = Prompter<BufReader<Stdin>, Stdout>;

impl StdioPrompter {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, message: impl Display) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }

    /// Ask a question and return the trimmed answer, `None` at end of input
    pub fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read from standard input")?;

        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Yes/no question; anything but an affirmative answer is a no
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        Ok(self
            .ask(question)?
            .map(|answer| is_affirmative(&answer))
            .unwrap_or(false))
    }
}

/// Interactive prompt -> download -> prompt again loop
pub struct Session<'a, R, W> {
    pipeline: &'a DownloadPipeline,
    prompter: &'a mut Prompter<R, W>,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(pipeline: &'a DownloadPipeline, prompter: &'a mut Prompter<R, W>) -> Self {
        Self { pipeline, prompter }
    }

    fn format(&self) -> MediaFormat {
        self.pipeline.downloader().format()
    }

    /// Describe what can be entered
    pub fn print_intro(&mut self) -> Result<()> {
        match self.format() {
            MediaFormat::Flac => {
                self.prompter.say("\nSupported URLs:")?;
                self.prompter.say("🎵 Single track: https://open.spotify.com/track/...")?;
                self.prompter.say("💿 Album: https://open.spotify.com/album/...")?;
                self.prompter.say("📝 Playlist: https://open.spotify.com/playlist/...")?;
                self.prompter.say("🎤 Artist (all songs): https://open.spotify.com/artist/...")?;
                self.prompter.say("🔍 Search query: 'Artist - Song Title'")?;
            }
            MediaFormat::Mp3 | MediaFormat::Mp4 => {
                self.prompter.say("\nSupported URLs:")?;
                self.prompter.say("🎬 Videos and playlists: https://www.youtube.com/watch?v=...")?;
                self.prompter.say("🌐 Any other site supported by yt-dlp")?;
            }
        }
        Ok(())
    }

    fn url_prompt(&self) -> &'static str {
        match self.format() {
            MediaFormat::Flac => "Enter Spotify URL or search query (or 'quit' to exit): ",
            MediaFormat::Mp3 | MediaFormat::Mp4 => "Enter URL (or 'quit' to exit): ",
        }
    }

    fn output_prompt(&self) -> String {
        let default = self
            .pipeline
            .template_for(None)
            .parent_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "current directory".to_string());
        format!("Output directory (press Enter for {}): ", default)
    }

    fn goodbye(&mut self) -> Result<()> {
        self.prompter.say("👋 Goodbye!")
    }

    /// Run until the user quits. Returns the number of successful downloads.
    pub async fn run(&mut self) -> Result<usize> {
        let mut completed = 0;

        loop {
            self.prompter.say(format!("\n{}", "-".repeat(50)))?;

            let url_prompt = self.url_prompt();
            let Some(target) = self.prompter.ask(url_prompt)? else {
                self.goodbye()?;
                break;
            };

            if is_quit(&target) {
                self.goodbye()?;
                break;
            }

            if target.is_empty() {
                self.prompter.say("❌ Please enter a valid URL or search query")?;
                continue;
            }

            let output_prompt = self.output_prompt();
            let output_dir = self
                .prompter
                .ask(&output_prompt)?
                .filter(|answer| !answer.is_empty())
                .map(PathBuf::from);

            let result = match self.pipeline.run(&target, output_dir.as_deref()).await {
                Err(e) if GrabError::is_cancellation(&e) => return Err(e),
                result => result,
            };

            if self.pipeline.report(&result) {
                completed += 1;
                if !self.prompter.confirm("\nDownload another? (y/n): ")? {
                    self.goodbye()?;
                    break;
                }
            } else if self.format() == MediaFormat::Flac {
                self.prompter.say("\n💡 Try using a search query instead of URL")?;
                self.prompter.say("Example: 'Artist Name - Song Title'")?;
            }
        }

        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloaders::{DownloadReport, MockMediaDownloader};
    use crate::output::OutputTemplate;
    use std::io::Cursor;

    fn pipeline_with(downloader: MockMediaDownloader, dir: &std::path::Path) -> DownloadPipeline {
        DownloadPipeline::new(Box::new(downloader), OutputTemplate::spotdl_in(dir))
    }

    fn flac_mock() -> MockMediaDownloader {
        let mut downloader = MockMediaDownloader::new();
        downloader.expect_format().return_const(MediaFormat::Flac);
        downloader.expect_tool_name().return_const("spotdl");
        downloader
    }

    #[test]
    fn test_quit_words() {
        assert!(is_quit("quit"));
        assert!(is_quit(" Q "));
        assert!(is_quit("EXIT"));
        assert!(!is_quit("https://open.spotify.com/track/1"));
    }

    #[test]
    fn test_affirmative_words() {
        for answer in ["y", "Yes", "s", "si", "sí"] {
            assert!(is_affirmative(answer), "{}", answer);
        }
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative(""));
    }

    #[test]
    fn test_ask_returns_none_at_eof() {
        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new("  hello  \n"), &mut output);

        assert_eq!(prompter.ask("? ").unwrap(), Some("hello".to_string()));
        assert_eq!(prompter.ask("? ").unwrap(), None);
        assert!(!prompter.confirm("ok? ").unwrap());
    }

    #[tokio::test]
    async fn test_single_download_then_decline() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = flac_mock();
        downloader
            .expect_download()
            .withf(|request| request.target == "Artist - Song")
            .times(1)
            .returning(|_| Ok(DownloadReport::default()));
        let pipeline = pipeline_with(downloader, dir.path());

        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new("Artist - Song\n\nn\n"), &mut output);
        let completed = Session::new(&pipeline, &mut prompter).run().await.unwrap();

        assert_eq!(completed, 1);
        assert!(String::from_utf8(output).unwrap().contains("Goodbye"));
    }

    #[tokio::test]
    async fn test_empty_input_reprompts_and_quit_exits() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = flac_mock();
        downloader.expect_download().never();
        let pipeline = pipeline_with(downloader, dir.path());

        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new("\nquit\n"), &mut output);
        let completed = Session::new(&pipeline, &mut prompter).run().await.unwrap();

        assert_eq!(completed, 0);
        assert!(String::from_utf8(output)
            .unwrap()
            .contains("Please enter a valid URL or search query"));
    }

    #[tokio::test]
    async fn test_continue_with_custom_directory() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom");
        let expected = custom.clone();

        let mut downloader = flac_mock();
        let mut seq = mockall::Sequence::new();
        downloader
            .expect_download()
            .withf(|request| request.target == "first")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(DownloadReport::default()));
        downloader
            .expect_download()
            .withf(move |request| {
                request.target == "second" && request.output.parent_dir() == Some(expected.clone())
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(DownloadReport::default()));
        let pipeline = pipeline_with(downloader, dir.path());

        let script = format!("first\n\nsi\nsecond\n{}\nno\n", custom.display());
        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new(script), &mut output);
        let completed = Session::new(&pipeline, &mut prompter).run().await.unwrap();

        assert_eq!(completed, 2);
        assert!(custom.is_dir());
    }

    #[tokio::test]
    async fn test_failure_prints_hint_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = flac_mock();
        downloader
            .expect_download()
            .times(1)
            .returning(|_| Err(GrabError::NoOutput.into()));
        let pipeline = pipeline_with(downloader, dir.path());

        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new("https://open.spotify.com/track/1\n\n"), &mut output);
        let completed = Session::new(&pipeline, &mut prompter).run().await.unwrap();

        assert_eq!(completed, 0);
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("Try using a search query instead of URL"));
        assert!(printed.contains("Goodbye"));
    }

    #[tokio::test]
    async fn test_prompter_shared_with_earlier_question() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = flac_mock();
        downloader
            .expect_download()
            .withf(|request| request.target == "Artist - Song")
            .times(1)
            .returning(|_| Ok(DownloadReport::default()));
        let pipeline = pipeline_with(downloader, dir.path());

        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new("n\nArtist - Song\n\nn\n"), &mut output);
        assert!(!prompter.confirm("Set up credentials? (y/n): ").unwrap());
        let completed = Session::new(&pipeline, &mut prompter).run().await.unwrap();

        assert_eq!(completed, 1);
    }

    #[tokio::test]
    async fn test_cancellation_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut downloader = flac_mock();
        downloader
            .expect_download()
            .times(1)
            .returning(|_| Err(GrabError::Cancelled.into()));
        let pipeline = pipeline_with(downloader, dir.path());

        let mut output = Vec::new();
        let mut prompter = Prompter::new(Cursor::new("first\n\nsecond\n\n"), &mut output);
        let err = Session::new(&pipeline, &mut prompter).run().await.unwrap_err();

        assert!(GrabError::is_cancellation(&err));
    }
}
