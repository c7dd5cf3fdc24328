use anyhow::Context;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::{GrabError, Result};

/// Lines of stderr kept for diagnostics
const STDERR_TAIL_LINES: usize = 50;

/// How long `--version` may take before the tool is considered unusable
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of running an external tool to completion
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stderr_tail: Vec<String>,
}

impl ToolOutput {
    pub fn stderr_text(&self) -> String {
        self.stderr_tail.join("\n")
    }
}

/// An external command with streaming output
pub struct ToolRunner<'a> {
    program: &'a str,
    args: &'a [String],
    timeout: Option<Duration>,
    echo_stderr: bool,
}

impl<'a> ToolRunner<'a> {
    pub fn new(program: &'a str, args: &'a [String]) -> Self {
        Self {
            program,
            args,
            timeout: None,
            echo_stderr: false,
        }
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Forward stderr lines to our stderr as they arrive
    pub fn echo_stderr(mut self, echo: bool) -> Self {
        self.echo_stderr = echo;
        self
    }

    /// Run to completion, handing each stdout line to `on_line`.
    ///
    /// The child is killed if this future is dropped, which is how
    /// timeouts and Ctrl-C stop it.
    pub async fn run<F>(self, mut on_line: F) -> Result<ToolOutput>
    where
        F: FnMut(&str),
    {
        tracing::debug!("Running {} {}", self.program, self.args.join(" "));

        let mut child = Command::new(self.program)
            .args(self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(self.program, e))?;

        let stdout = child.stdout.take().context("Child stdout was not captured")?;
        let stderr = child.stderr.take().context("Child stderr was not captured")?;

        let echo = self.echo_stderr;
        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = next_line_lossy(&mut reader, &mut buf).await {
                if echo {
                    eprintln!("{}", line);
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        });

        let run = async {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            while let Some(line) = next_line_lossy(&mut reader, &mut buf).await? {
                on_line(&line);
            }
            Ok::<_, anyhow::Error>(child.wait().await?)
        };

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(status) => status?,
                Err(_) => {
                    stderr_task.abort();
                    return Err(GrabError::TimedOut {
                        tool: self.program.to_string(),
                        secs: limit.as_secs(),
                    }
                    .into());
                }
            },
            None => run.await?,
        };

        let stderr_tail = stderr_task.await.unwrap_or_default().into_iter().collect();
        tracing::debug!("{} exited with {}", self.program, status);

        Ok(ToolOutput {
            status,
            stderr_tail,
        })
    }
}

/// Next line without its terminator. Tools print file names and titles in
/// whatever encoding they got, so invalid UTF-8 is replaced instead of failing.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

fn spawn_error(program: &str, error: std::io::Error) -> anyhow::Error {
    if error.kind() == ErrorKind::NotFound {
        GrabError::MissingTool(program.to_string()).into()
    } else {
        anyhow::Error::new(error).context(format!("Failed to start {}", program))
    }
}

/// Run `<program> --version` and return its first line
pub async fn tool_version(program: &str) -> Result<String> {
    let output = tokio::time::timeout(
        VERSION_TIMEOUT,
        Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| GrabError::MissingTool(program.to_string()))?
    .map_err(|e| spawn_error(program, e))?;

    if !output.status.success() {
        return Err(GrabError::MissingTool(program.to_string()).into());
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}
