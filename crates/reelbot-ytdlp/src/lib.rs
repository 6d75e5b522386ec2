//! yt-dlp / ffprobe adapters.
//!
//! `YtDlpTool` implements the core [`FetchTool`] port, `FfprobeProbe` the
//! [`MediaProbe`] port. Both spawn short-lived subprocesses with `kill_on_drop`, so a
//! caller that gives up on the future also kills the process.

use std::{
    collections::VecDeque,
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};

use reelbot_core::{
    domain::Dimensions,
    download::{AttemptFailure, FetchInvocation, FetchTool},
    probe::{parse_dimensions, MediaProbe},
};

const STDERR_TAIL_MAX_BYTES: usize = 16 * 1024;
const STDERR_TAIL_MAX_LINES: usize = 50;

/// Last lines of a subprocess' stderr, bounded in lines and bytes.
#[derive(Clone, Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push_line(&mut self, line: String) {
        // +1 for the '\n' we join with later.
        self.bytes = self.bytes.saturating_add(line.len() + 1);
        self.lines.push_back(line);

        while self.lines.len() > STDERR_TAIL_MAX_LINES || self.bytes > STDERR_TAIL_MAX_BYTES {
            match self.lines.pop_front() {
                Some(front) => self.bytes = self.bytes.saturating_sub(front.len() + 1),
                None => break,
            }
        }
    }

    fn snapshot(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Reads stderr until EOF. Lines that are not valid UTF-8 are kept lossily; closing
/// the pipe early would make the child die on its next write.
async fn drain_stderr<R: AsyncRead + Unpin>(stderr: R, tail: &mut StderrTail) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                tail.push_line(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) => {
                tracing::warn!("failed to read yt-dlp stderr: {e}");
                break;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct YtDlpTool {
    path: PathBuf,
}

impl YtDlpTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Command line for one invocation. The URL always comes last.
pub fn build_args(inv: &FetchInvocation) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--quiet".into(),
        "--no-warnings".into(),
        "--format".into(),
        inv.format.clone().into(),
        "--limit-rate".into(),
        inv.rate_limit.clone().into(),
        "--output".into(),
        inv.output_template.clone().into_os_string(),
    ];
    if let Some(proxy) = &inv.proxy {
        args.push("--proxy".into());
        args.push(proxy.into());
    }
    args.push(inv.url.clone().into());
    args
}

#[async_trait]
impl FetchTool for YtDlpTool {
    async fn run(&self, inv: &FetchInvocation) -> Result<(), AttemptFailure> {
        let mut cmd = Command::new(&self.path);
        cmd.args(build_args(inv))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| AttemptFailure::Spawn(format!("{}: {e}", self.path.display())))?;

        let mut tail = StderrTail::default();
        if let Some(stderr) = child.stderr.take() {
            drain_stderr(stderr, &mut tail).await;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AttemptFailure::Spawn(format!("failed to wait for yt-dlp: {e}")))?;

        if status.success() {
            return Ok(());
        }

        let stderr = tail.snapshot();
        tracing::debug!(code = ?status.code(), stderr = %stderr, "yt-dlp exited with failure");
        Err(AttemptFailure::Exit {
            code: status.code(),
            stderr,
        })
    }
}

/// Reads video stream dimensions with `ffprobe`.
#[derive(Clone, Debug)]
pub struct FfprobeProbe {
    path: PathBuf,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Option<Dimensions> {
        let mut cmd = Command::new(&self.path);
        cmd.args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                tracing::warn!(
                    file = %path.display(),
                    "ffprobe timed out after {:?}",
                    self.timeout
                );
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(file = %path.display(), "failed to run ffprobe: {e}");
                return None;
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            tracing::warn!(
                file = %path.display(),
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "ffprobe failed"
            );
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let dims = parse_dimensions(&stdout);
        if dims.is_none() {
            tracing::warn!(
                file = %path.display(),
                output = %stdout.trim(),
                "could not parse ffprobe output"
            );
        }
        dims
    }
}
