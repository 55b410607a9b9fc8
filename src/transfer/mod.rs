//! Runs the external copy tool file by file and reports progress
//!
//! Each video goes through `Idle -> Copying -> Succeeded | Failed`. Files of a
//! move are copied one after another; the first failure stops the move and
//! leaves every source file untouched.

pub mod progress;
pub mod rsync;
#[cfg(test)]
pub(crate) mod testing;
pub mod verify;

pub use progress::{ProgressEvent, ProgressSink, ProgressTracker};
pub use rsync::CopyTool;
pub use verify::Verification;

use crate::error::{MoveError, Result};
use progress::{LineSplitter, parse_progress_line};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Time a child gets to exit after SIGTERM before it is killed
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Copying,
    Succeeded,
    Failed,
}

impl TransferState {
    /// Allowed edges of the per-file state machine
    pub const fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Copying | Self::Failed)
                | (Self::Copying, Self::Succeeded | Self::Failed)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Copying => "copying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A subtitle that rides along with a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// One planned video copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub size: u64,
    pub subtitles: Vec<SubtitleTransfer>,
}

impl FileTransfer {
    fn display_name(&self) -> String {
        self.source
            .file_name()
            .map_or_else(|| self.source.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// What a completed run copied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Destination paths of copied videos, in copy order
    pub videos: Vec<PathBuf>,
    /// Destination paths of copied subtitles
    pub subtitles: Vec<PathBuf>,
    /// Source paths whose copy succeeded (videos and subtitles)
    pub copied_sources: Vec<PathBuf>,
    pub bytes: u64,
    pub warnings: Vec<String>,
}

/// State of one video copy, with transitions logged
struct FileCopy<'a> {
    file: &'a FileTransfer,
    state: TransferState,
}

impl<'a> FileCopy<'a> {
    const fn new(file: &'a FileTransfer) -> Self {
        Self {
            file,
            state: TransferState::Idle,
        }
    }

    fn advance(&mut self, next: TransferState) {
        debug_assert!(
            self.state.can_become(next),
            "invalid transfer transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(
            "{}: {} -> {}",
            self.file.source.display(),
            self.state,
            next
        );
        self.state = next;
    }

    fn fail(&mut self, err: MoveError) -> MoveError {
        if !self.state.is_terminal() {
            self.advance(TransferState::Failed);
        }
        err
    }
}

enum Exit {
    Status(std::io::Result<std::process::ExitStatus>),
    Cancelled,
    TimedOut,
}

/// Drives the copy tool over a list of planned files
pub struct TransferOrchestrator<'a> {
    tool: &'a CopyTool,
    elevated: bool,
    cancel: CancellationToken,
}

impl<'a> TransferOrchestrator<'a> {
    pub const fn new(tool: &'a CopyTool, elevated: bool, cancel: CancellationToken) -> Self {
        Self {
            tool,
            elevated,
            cancel,
        }
    }

    /// Copy every file in order
    ///
    /// With `numbered` set, progress events carry a 1-based file position
    /// (season packs); otherwise index and count stay 0.
    pub async fn run(&self, files: &[FileTransfer], sink: ProgressSink, numbered: bool) -> Result<TransferReport> {
        let total: u64 = files.iter().map(|f| f.size).sum();
        let file_count = if numbered { files.len() } else { 0 };
        let mut tracker = ProgressTracker::new(sink, total, file_count);
        let deadline = self.tool.timeout.map(|t| Instant::now() + t);
        let mut report = TransferReport::default();

        for (i, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(MoveError::Cancelled {
                    file: file.source.clone(),
                });
            }

            let index = if numbered { i + 1 } else { 0 };
            tracker.begin_file(index, file.display_name(), file.size);
            tracing::info!(
                "Copying {} -> {}",
                file.source.display(),
                file.destination.display()
            );

            tracker = self.copy_video(file, tracker, deadline).await?;
            tracker.finish_file();

            report.videos.push(file.destination.clone());
            report.copied_sources.push(file.source.clone());
            report.bytes = tracker.bytes_done();

            for subtitle in &file.subtitles {
                match self.copy_subtitle(subtitle, deadline).await {
                    Ok(()) => {
                        report.subtitles.push(subtitle.destination.clone());
                        report.copied_sources.push(subtitle.source.clone());
                    }
                    Err(e @ (MoveError::Cancelled { .. } | MoveError::TimedOut { .. })) => return Err(e),
                    Err(e) => {
                        tracing::warn!("{}", e);
                        report.warnings.push(e.to_string());
                    }
                }
            }
        }

        Ok(report)
    }

    async fn copy_video(
        &self,
        file: &FileTransfer,
        tracker: ProgressTracker,
        deadline: Option<Instant>,
    ) -> Result<ProgressTracker> {
        let mut copy = FileCopy::new(file);

        if let Some(parent) = file.destination.parent() {
            self.tool
                .ensure_directory(parent, self.elevated)
                .await
                .map_err(|e| copy.fail(e))?;
        }

        let mut command = self
            .tool
            .video_command(&file.source, &file.destination, self.elevated);
        tracing::debug!("Running {:?}", command.as_std());

        let mut child = command.spawn().map_err(|e| {
            copy.fail(MoveError::TransferFailed {
                file: file.source.clone(),
                reason: format!("cannot start {}: {}", self.tool.program.display(), e),
                stderr: String::new(),
            })
        })?;
        copy.advance(TransferState::Copying);

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            terminate(&mut child).await;
            return Err(copy.fail(MoveError::TransferFailed {
                file: file.source.clone(),
                reason: "copy tool output was not captured".to_string(),
                stderr: String::new(),
            }));
        };

        let reader = tokio::spawn(read_progress(stdout, tracker));
        let errors = tokio::spawn(read_all(stderr));

        let status = match self.wait_child(&mut child, deadline).await {
            Exit::Status(status) => status,
            Exit::Cancelled => {
                tracing::warn!("Cancelling copy of {}", file.source.display());
                terminate(&mut child).await;
                reader.abort();
                errors.abort();
                return Err(copy.fail(MoveError::Cancelled {
                    file: file.source.clone(),
                }));
            }
            Exit::TimedOut => {
                tracing::warn!("Copy of {} hit its deadline", file.source.display());
                terminate(&mut child).await;
                reader.abort();
                errors.abort();
                return Err(copy.fail(self.timed_out(&file.source)));
            }
        };

        let tracker = reader.await.map_err(|e| {
            copy.fail(MoveError::TransferFailed {
                file: file.source.clone(),
                reason: format!("progress reader failed: {e}"),
                stderr: String::new(),
            })
        })?;
        let stderr = errors.await.unwrap_or_default();

        let status = status.map_err(|e| copy.fail(MoveError::Io(e)))?;
        if !status.success() {
            tracing::error!("Copy of {} failed with {}", file.source.display(), status);
            return Err(copy.fail(MoveError::TransferFailed {
                file: file.source.clone(),
                reason: exit_reason(status),
                stderr,
            }));
        }

        verify::verify_copy(
            &file.source,
            &file.destination,
            self.tool.verification,
            self.elevated,
        )
        .await
        .map_err(|e| copy.fail(e))?;

        copy.advance(TransferState::Succeeded);
        Ok(tracker)
    }

    /// Subtitle failures come back as `SubtitleCopyFailed`; a cancel or the
    /// move deadline as `Cancelled` / `TimedOut`
    async fn copy_subtitle(&self, subtitle: &SubtitleTransfer, deadline: Option<Instant>) -> Result<()> {
        let failed = |reason: String| MoveError::SubtitleCopyFailed {
            path: subtitle.source.clone(),
            reason,
        };

        let mut command = self
            .tool
            .subtitle_command(&subtitle.source, &subtitle.destination, self.elevated);
        tracing::debug!("Running {:?}", command.as_std());

        let mut child = command
            .spawn()
            .map_err(|e| failed(format!("cannot start copy tool: {e}")))?;
        let errors = child.stderr.take().map(|stderr| tokio::spawn(read_all(stderr)));

        let status = match self.wait_child(&mut child, deadline).await {
            Exit::Status(status) => status.map_err(|e| failed(e.to_string()))?,
            Exit::Cancelled => {
                tracing::warn!("Cancelling copy of {}", subtitle.source.display());
                terminate(&mut child).await;
                if let Some(errors) = errors {
                    errors.abort();
                }
                return Err(MoveError::Cancelled {
                    file: subtitle.source.clone(),
                });
            }
            Exit::TimedOut => {
                tracing::warn!("Copy of {} hit its deadline", subtitle.source.display());
                terminate(&mut child).await;
                if let Some(errors) = errors {
                    errors.abort();
                }
                return Err(self.timed_out(&subtitle.source));
            }
        };

        if status.success() {
            tracing::debug!("Copied subtitle {}", subtitle.destination.display());
            return Ok(());
        }

        let stderr = match errors {
            Some(errors) => errors.await.unwrap_or_default(),
            None => String::new(),
        };
        Err(failed(format!("{}: {}", exit_reason(status), stderr.trim())))
    }

    async fn wait_child(&self, child: &mut Child, deadline: Option<Instant>) -> Exit {
        tokio::select! {
            status = child.wait() => Exit::Status(status),
            () = self.cancel.cancelled() => Exit::Cancelled,
            () = wait_for(deadline) => Exit::TimedOut,
        }
    }

    fn timed_out(&self, file: &Path) -> MoveError {
        MoveError::TimedOut {
            file: file.to_path_buf(),
            after: self.tool.timeout.unwrap_or_default(),
        }
    }
}

fn exit_reason(status: std::process::ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| format!("terminated ({status})"), |code| format!("exit code {code}"))
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Feed stdout through the splitter and parser until EOF
async fn read_progress(mut stdout: impl AsyncRead + Unpin, mut tracker: ProgressTracker) -> ProgressTracker {
    let mut splitter = LineSplitter::new();
    let mut buffer = vec![0u8; READ_CHUNK];

    loop {
        match stdout.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&buffer[..n]) {
                    handle_line(&line, &mut tracker);
                }
            }
            Err(e) => {
                tracing::debug!("Stopped reading copy tool output: {}", e);
                break;
            }
        }
    }

    if let Some(line) = splitter.finish() {
        handle_line(&line, &mut tracker);
    }
    tracker
}

fn handle_line(line: &str, tracker: &mut ProgressTracker) {
    match parse_progress_line(line) {
        Some(sample) => tracker.record(&sample),
        None => tracing::trace!("copy tool: {}", line.trim()),
    }
}

async fn read_all(mut stream: impl AsyncRead + Unpin) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = stream.read_to_end(&mut bytes).await {
        tracing::debug!("Stopped reading copy tool errors: {}", e);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// SIGTERM, a grace period, then SIGKILL
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {
                if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok() {
                    return;
                }
                tracing::warn!("Copy tool (pid {}) ignored SIGTERM, killing", pid);
            }
            Err(e) => tracing::debug!("SIGTERM to pid {} failed: {}", pid, e),
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!("Killing copy tool failed: {}", e);
    }
}
