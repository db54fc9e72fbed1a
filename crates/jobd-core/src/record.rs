// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The job record and its state machine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JobError;

pub const MAX_JOB_ID_LEN: usize = 128;

/// Lifecycle status of a job.
///
/// ```text
/// QUEUED -> CLAIMED -> PREPARED -> RUNNING -> SUCCESS
///    \          \          \          \  \--> PARTIAL -> SUCCESS | FAILED
///     \----------\----------\----------\----> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
	/// Accepted, waiting for the dispatch sweep.
	Queued,
	/// Picked up by a dispatch sweep, not yet unpacked.
	Claimed,
	/// Working directory populated, launcher executable.
	Prepared,
	/// Running locally or accepted by the remote service.
	Running,
	/// Remote service returned intermediate output.
	Partial,
	Success,
	Failed,
}

impl JobStatus {
	pub const ALL: [JobStatus; 7] = [
		JobStatus::Queued,
		JobStatus::Claimed,
		JobStatus::Prepared,
		JobStatus::Running,
		JobStatus::Partial,
		JobStatus::Success,
		JobStatus::Failed,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Queued => "QUEUED",
			Self::Claimed => "CLAIMED",
			Self::Prepared => "PREPARED",
			Self::Running => "RUNNING",
			Self::Partial => "PARTIAL",
			Self::Success => "SUCCESS",
			Self::Failed => "FAILED",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Success | Self::Failed)
	}

	/// Whether `GetJob` hands the record out.
	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Success | Self::Failed | Self::Partial)
	}

	pub fn can_transition_to(&self, next: JobStatus) -> bool {
		use JobStatus::*;
		match self {
			Queued => matches!(next, Claimed | Prepared | Failed),
			Claimed => matches!(next, Prepared | Failed),
			Prepared => matches!(next, Running | Failed),
			Running => matches!(next, Partial | Success | Failed),
			Partial => matches!(next, Partial | Success | Failed),
			Success | Failed => false,
		}
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for JobStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.iter()
			.find(|status| status.as_str() == s)
			.copied()
			.ok_or_else(|| format!("unknown job status: {s}"))
	}
}

/// Input of `CreateJob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSubmission {
	/// Missing ids deserialize as empty and are rejected by validation.
	#[serde(default)]
	pub id: String,
	/// Base64 encoded zip archive.
	pub input: String,
	#[serde(default, alias = "slurml")]
	pub delegate: bool,
}

/// The persisted job entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
	pub id: String,
	pub status: JobStatus,
	pub working_path: PathBuf,
	pub input_payload: String,
	pub output_payload: Option<String>,
	pub message: String,
	pub delegate: bool,
	pub remote_id: Option<i64>,
	pub last_updated: DateTime<Utc>,
	/// Optimistic concurrency counter, bumped by every conditional write.
	pub version: u64,
}

impl JobRecord {
	/// Build a fresh QUEUED record. The id must already be validated.
	pub fn new(submission: JobSubmission, base_dir: &Path) -> Self {
		let working_path = base_dir.join(&submission.id);
		Self {
			id: submission.id,
			status: JobStatus::Queued,
			working_path,
			input_payload: submission.input,
			output_payload: None,
			message: String::new(),
			delegate: submission.delegate,
			remote_id: None,
			last_updated: Utc::now(),
			version: 0,
		}
	}

	fn touch(&mut self) {
		self.last_updated = Utc::now();
	}

	/// Move to `next`. Backward transitions are rejected and leave the
	/// record untouched.
	pub fn set_status(&mut self, next: JobStatus) -> Result<(), JobStatus> {
		if !self.status.can_transition_to(next) {
			return Err(self.status);
		}
		self.status = next;
		self.touch();
		Ok(())
	}

	pub fn set_output(&mut self, output: String) {
		self.output_payload = Some(output);
		self.touch();
	}

	pub fn set_message(&mut self, message: impl Into<String>) {
		self.message = message.into();
		self.touch();
	}

	/// Append a diagnostic line to the message.
	pub fn append_message(&mut self, line: &str) {
		if !self.message.is_empty() {
			self.message.push('\n');
		}
		self.message.push_str(line);
		self.touch();
	}

	pub fn set_remote_id(&mut self, remote_id: i64) {
		self.remote_id = Some(remote_id);
		self.touch();
	}

	pub fn view(&self) -> JobView {
		JobView::from(self)
	}
}

/// What a successful `GetJob` returns: the record without its input and
/// working path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
	pub id: String,
	pub status: JobStatus,
	pub output_payload: Option<String>,
	pub message: String,
	pub delegate: bool,
	pub remote_id: Option<i64>,
	pub last_updated: DateTime<Utc>,
}

impl From<&JobRecord> for JobView {
	fn from(record: &JobRecord) -> Self {
		Self {
			id: record.id.clone(),
			status: record.status,
			output_payload: record.output_payload.clone(),
			message: record.message.clone(),
			delegate: record.delegate,
			remote_id: record.remote_id,
			last_updated: record.last_updated,
		}
	}
}

/// Job ids become directory names, so they are restricted to a safe charset.
pub fn validate_job_id(id: &str) -> Result<(), JobError> {
	if id.is_empty() {
		return Err(JobError::Validation("job id is required".to_string()));
	}
	if id.len() > MAX_JOB_ID_LEN {
		return Err(JobError::Validation(format!(
			"job id must be at most {MAX_JOB_ID_LEN} characters"
		)));
	}
	if id == "." || id == ".." {
		return Err(JobError::Validation(format!("job id '{id}' is reserved")));
	}
	if let Some(c) = id
		.chars()
		.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
	{
		return Err(JobError::Validation(format!(
			"job id contains invalid character {c:?}"
		)));
	}
	Ok(())
}
