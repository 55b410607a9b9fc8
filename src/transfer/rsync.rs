use super::verify::Verification;
use crate::error::{MoveError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Flags for the main video copy: archive mode, resumable in-place writes,
/// one machine-readable progress line, destination directories created on demand
const VIDEO_FLAGS: &[&str] = &[
    "-a",
    "-h",
    "--info=progress2",
    "--no-inc-recursive",
    "--partial",
    "--inplace",
    "--mkpath",
];

/// Flags for one-shot subtitle copies
const SUBTITLE_FLAGS: &[&str] = &["-a", "--inplace", "--mkpath"];

const ELEVATION_PROGRAM: &str = "sudo";

/// How the external bulk-copy tool is invoked
///
/// The full command line is `[sudo -n] [wrapper...] program FLAGS extra_args SRC DST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTool {
    pub program: PathBuf,
    /// Command prefix such as `["ionice", "-c3"]`
    pub wrapper: Vec<String>,
    pub extra_args: Vec<String>,
    /// Deadline for a whole move
    pub timeout: Option<Duration>,
    pub verification: Verification,
}

impl CopyTool {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("rsync"),
            wrapper: Vec::new(),
            extra_args: Vec::new(),
            timeout: None,
            verification: Verification::Size,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_wrapper(mut self, wrapper: Vec<String>) -> Self {
        self.wrapper = wrapper;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn with_verification(mut self, verification: Verification) -> Self {
        self.verification = verification;
        self
    }

    /// Program and leading arguments, before any copy flags
    fn invocation(&self, elevated: bool) -> Vec<OsString> {
        let mut parts: Vec<OsString> = Vec::new();
        if elevated {
            parts.push(ELEVATION_PROGRAM.into());
            // never prompt for a password
            parts.push("-n".into());
        }
        parts.extend(self.wrapper.iter().map(OsString::from));
        parts.push(self.program.clone().into_os_string());
        parts
    }

    fn command(&self, elevated: bool, flags: &[&str], source: &Path, destination: &Path) -> Command {
        let invocation = self.invocation(elevated);
        let (program, leading) = invocation.split_first().map_or_else(
            || (self.program.clone().into_os_string(), &[][..]),
            |(first, rest)| (first.clone(), rest),
        );

        let mut cmd = Command::new(program);
        cmd.args(leading)
            .args(flags)
            .args(&self.extra_args)
            .arg(source.as_os_str())
            .arg(destination.as_os_str())
            .stdin(Stdio::null());
        cmd
    }

    /// Command that copies a video with a progress stream on stdout
    pub fn video_command(&self, source: &Path, destination: &Path, elevated: bool) -> Command {
        let mut cmd = self.command(elevated, VIDEO_FLAGS, source, destination);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Command that copies a subtitle without progress output
    pub fn subtitle_command(&self, source: &Path, destination: &Path, elevated: bool) -> Command {
        let mut cmd = self.command(elevated, SUBTITLE_FLAGS, source, destination);
        cmd.stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Make sure `dir` exists, unprivileged first
    ///
    /// With elevation requested, a failed plain `create_dir_all` is retried as
    /// `sudo -n mkdir -p`; if that fails too the copy tool's `--mkpath` gets the
    /// last word. Without elevation a failure is fatal.
    pub async fn ensure_directory(&self, dir: &Path, elevated: bool) -> Result<()> {
        let err = match tokio::fs::create_dir_all(dir).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !elevated {
            return Err(MoveError::TransferFailed {
                file: dir.to_path_buf(),
                reason: format!("cannot create destination directory: {err}"),
                stderr: String::new(),
            });
        }

        tracing::debug!(
            "Plain mkdir of {} failed ({}), retrying with {}",
            dir.display(),
            err,
            ELEVATION_PROGRAM
        );

        let status = Command::new(ELEVATION_PROGRAM)
            .arg("-n")
            .arg("mkdir")
            .arg("-p")
            .arg(dir.as_os_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(
                "Elevated mkdir of {} exited with {}, relying on the copy tool",
                dir.display(),
                status
            ),
            Err(e) => tracing::warn!(
                "Could not run elevated mkdir for {}: {}, relying on the copy tool",
                dir.display(),
                e
            ),
        }
        Ok(())
    }

    /// Check that the tool can be started (`--version`)
    pub fn probe(&self) -> std::io::Result<()> {
        let invocation = self.invocation(false);
        let Some((program, leading)) = invocation.split_first() else {
            return Err(std::io::Error::other("empty copy tool invocation"));
        };

        let output = std::process::Command::new(program)
            .args(leading)
            .arg("--version")
            .stdin(Stdio::null())
            .output()?;

        if output.status.success() {
            tracing::debug!("{} is available", self.program.display());
            Ok(())
        } else {
            Err(std::io::Error::other(format!(
                "{} --version exited with {}",
                self.program.display(),
                output.status
            )))
        }
    }
}

impl Default for CopyTool {
    fn default() -> Self {
        Self::new()
    }
}
