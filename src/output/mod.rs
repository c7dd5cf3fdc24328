use anyhow::Result;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::GrabError;

/// yt-dlp's extension placeholder
pub const EXT_PLACEHOLDER: &str = "%(ext)s";

/// spotdl filename pattern, resolved by spotdl from track metadata
pub const SPOTDL_FILENAME: &str = "{artists} - {title}.{output-ext}";

/// Number of produced files listed in a summary
const SUMMARY_LIMIT: usize = 3;

/// A path template whose placeholders are resolved by the downloading tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate(String);

impl OutputTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// `<dir>/%(title)s.%(ext)s`
    pub fn titled_in(dir: &Path) -> Self {
        Self(dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned())
    }

    /// spotdl's `<dir>/{artists} - {title}.{output-ext}`
    pub fn spotdl_in(dir: &Path) -> Self {
        Self(dir.join(SPOTDL_FILENAME).to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pin the extension placeholder to a literal extension
    pub fn force_extension(&self, extension: &str) -> Self {
        Self(self.0.replace(EXT_PLACEHOLDER, extension))
    }

    /// Directory part of the template, `None` for a bare filename
    pub fn parent_dir(&self) -> Option<PathBuf> {
        Path::new(&self.0)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// Keep the filename part but place it under `dir`
    pub fn in_directory(&self, dir: &Path) -> Self {
        let file_part = Path::new(&self.0)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "%(title)s.%(ext)s".to_string());
        Self(dir.join(file_part).to_string_lossy().into_owned())
    }
}

impl std::fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Create `dir` and its parents. Succeeds when the directory already exists.
pub fn ensure_directory(dir: &Path) -> Result<()> {
    match fs_err::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            Err(GrabError::PermissionDenied(dir.to_path_buf()).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// The user's Music directory, falling back to `~/Music`
pub fn default_music_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
        .unwrap_or_else(|| PathBuf::from("Music"))
}

/// List files in `dir` with the given extension (case-insensitive), sorted by name
pub fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Files with one extension present in a directory at a point in time
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    dir: PathBuf,
    extension: String,
    before: BTreeSet<PathBuf>,
}

impl DirectorySnapshot {
    pub fn take(dir: &Path, extension: &str) -> Result<Self> {
        Ok(Self {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
            before: files_with_extension(dir, extension)?.into_iter().collect(),
        })
    }

    /// All matching files now, and the subset not present when the snapshot was taken
    pub fn diff(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let present = files_with_extension(&self.dir, &self.extension)?;
        let created = present
            .iter()
            .filter(|path| !self.before.contains(*path))
            .cloned()
            .collect();
        Ok((present, created))
    }
}

/// Print the last few produced files
pub fn print_file_summary(files: &[PathBuf]) {
    let skipped = files.len().saturating_sub(SUMMARY_LIMIT);
    for file in &files[skipped..] {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| file.to_string_lossy());
        println!("   ✅ {}", name);
    }
    if skipped > 0 {
        println!("   ... and {} more files", skipped);
    }
}
