//! Bounded subprocess execution for external media tools.
//!
//! Every invocation gets a closed stdin (the tool must never block waiting
//! for terminal input), captured stdout/stderr, and an optional deadline
//! after which the process is killed. The runner never retries; retry
//! policy belongs to the caller, as does interpretation of a non-zero exit.

use crate::{Error, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Structured result of one tool invocation.
#[derive(Debug)]
pub struct RunOutput {
    /// Exit code, if the process exited normally.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// A bounded tail of stderr suitable for a persisted diagnostic.
    pub fn stderr_excerpt(&self) -> String {
        excerpt(&self.stderr)
    }
}

/// Keep the tail of a diagnostic; ffmpeg puts the useful part last.
fn excerpt(text: &str) -> String {
    const MAX: usize = 800;
    let trimmed = text.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let tail_start = trimmed.len() - MAX;
    // Don't split a UTF-8 character
    let start = (tail_start..trimmed.len())
        .find(|i| trimmed.is_char_boundary(*i))
        .unwrap_or(trimmed.len());
    format!("...{}", &trimmed[start..])
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.display().to_string())
}

/// Run an external tool to completion, capturing its output.
///
/// With a timeout, the process is killed once the deadline expires and the
/// call returns [`Error::ToolTimedOut`]. Without one, the call waits
/// indefinitely. A missing executable maps to [`Error::ToolNotFound`].
pub async fn run_tool<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    timeout: Option<Duration>,
) -> Result<RunOutput> {
    let tool = tool_name(program);
    tracing::debug!("Running {} with {} args", tool, args.len());

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the wait future on timeout must take the process with it
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::tool_not_found(tool.clone())
        } else {
            Error::Io(e)
        }
    })?;

    let output = match timeout {
        Some(deadline) => tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| Error::ToolTimedOut {
                tool: tool.clone(),
                secs: deadline.as_secs(),
            })??,
        None => child.wait_with_output().await?,
    };

    Ok(RunOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Verify an input artifact exists and is non-empty, returning its size.
///
/// Used before handing a path to a tool: a bad input is a caller error and
/// the invocation must be skipped, not attempted and retried.
pub fn expect_input(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Err(Error::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let len = std::fs::metadata(path)?.len();
    if len == 0 {
        return Err(Error::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    Ok(len)
}

/// Verify an output artifact exists and is non-empty, returning its size.
///
/// An exit-0 run that produced no file (or an empty one) is a failure
/// regardless of the reported status.
pub fn expect_artifact(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Err(Error::MissingOutput {
            path: path.to_path_buf(),
        });
    }
    let len = std::fs::metadata(path)?.len();
    if len == 0 {
        return Err(Error::EmptyOutput {
            path: path.to_path_buf(),
        });
    }
    Ok(len)
}

/// Convenience: the absolute form of a path, falling back to the path
/// itself when canonicalization fails (e.g. not yet created).
pub fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
