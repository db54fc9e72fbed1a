// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runs a job's launcher script as a subprocess.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Longest stderr tail kept in an error.
const MAX_STDERR_TAIL: usize = 2048;

#[derive(Debug, Error)]
pub enum ExecutionError {
	#[error("could not start {script}: {source}")]
	Spawn {
		script: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{}", exit_message(.code, .stderr))]
	NonZeroExit { code: Option<i32>, stderr: String },

	#[error("execution timed out after {0:?}")]
	TimedOut(Duration),

	#[error("execution cancelled")]
	Cancelled,

	#[error("i/o error while waiting for the script: {0}")]
	Io(#[from] std::io::Error),
}

fn exit_message(code: &Option<i32>, stderr: &str) -> String {
	let status = match code {
		Some(code) => format!("exit status {code}"),
		None => "terminated by signal".to_string(),
	};
	if stderr.trim().is_empty() {
		status
	} else {
		format!("{status}: {}", stderr.trim_end())
	}
}

#[derive(Debug, Clone)]
pub struct ExitOutcome {
	pub code: i32,
	pub stdout: String,
	pub stderr: String,
	pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
	timeout: Option<Duration>,
}

impl LocalExecutor {
	pub fn new(timeout: Option<Duration>) -> Self {
		Self { timeout }
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	/// Run `dir/script` with `dir` as working directory and wait for it.
	///
	/// The child is killed if the deadline passes or `cancel` fires.
	#[instrument(skip(self, cancel), fields(dir = %dir.display()))]
	pub async fn run(
		&self,
		dir: &Path,
		script: &str,
		cancel: &CancellationToken,
	) -> Result<ExitOutcome, ExecutionError> {
		let dir = tokio::fs::canonicalize(dir)
			.await
			.map_err(|source| ExecutionError::Spawn {
				script: script.to_string(),
				source,
			})?;

		let started = Instant::now();
		let mut command = Command::new(dir.join(script));
		command
			.current_dir(&dir)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);
		#[cfg(unix)]
		command.process_group(0);

		let child = command.spawn().map_err(|source| ExecutionError::Spawn {
			script: script.to_string(),
			source,
		})?;

		// The script leads its own group; anything it forks dies with it.
		let mut group = ProcessGroupGuard { pgid: child.id() };
		let wait = child.wait_with_output();
		tokio::pin!(wait);

		let deadline = async {
			match self.timeout {
				Some(timeout) => tokio::time::sleep(timeout).await,
				None => std::future::pending().await,
			}
		};

		// Returning early drops `wait` and `group`, killing the whole group.
		let output = tokio::select! {
			output = &mut wait => output?,
			_ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
			_ = deadline => {
				return Err(ExecutionError::TimedOut(self.timeout.unwrap_or_default()));
			}
		};
		group.disarm();

		let duration = started.elapsed();
		let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
		let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
		debug!(
			code = ?output.status.code(),
			duration_ms = duration.as_millis() as u64,
			"script exited"
		);

		if !output.status.success() {
			return Err(ExecutionError::NonZeroExit {
				code: output.status.code(),
				stderr: tail(&stderr, MAX_STDERR_TAIL),
			});
		}

		Ok(ExitOutcome {
			code: output.status.code().unwrap_or_default(),
			stdout,
			stderr,
			duration,
		})
	}
}

/// Sends SIGKILL to a process group on drop unless disarmed.
struct ProcessGroupGuard {
	pgid: Option<u32>,
}

impl ProcessGroupGuard {
	fn disarm(&mut self) {
		self.pgid = None;
	}
}

impl Drop for ProcessGroupGuard {
	fn drop(&mut self) {
		let Some(pgid) = self.pgid.take() else {
			return;
		};
		#[cfg(unix)]
		{
			// SAFETY: killpg takes no pointers; a group that is already gone yields ESRCH.
			let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
			if rc == 0 {
				debug!(pgid, "killed script process group");
			}
		}
		#[cfg(not(unix))]
		let _ = pgid;
	}
}

fn tail(text: &str, max: usize) -> String {
	if text.len() <= max {
		return text.to_string();
	}
	let mut start = text.len() - max;
	while !text.is_char_boundary(start) {
		start += 1;
	}
	text[start..].to_string()
}
