// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for job records and stores.

use thiserror::Error;

/// Errors raised by a [`crate::JobStore`].
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("job already exists: {0}")]
	Conflict(String),

	#[error("job not found: {0}")]
	NotFound(String),

	#[error("job {id} was modified concurrently (expected version {expected})")]
	VersionMismatch { id: String, expected: u64 },

	#[error("stored job is corrupt: {0}")]
	Corrupt(String),

	#[error("storage backend error: {0}")]
	Backend(String),
}

/// Errors surfaced to API callers of `CreateJob` / `GetJob`.
#[derive(Debug, Error)]
pub enum JobError {
	#[error("invalid job: {0}")]
	Validation(String),

	#[error("job already exists: {0}")]
	Conflict(String),

	#[error("job not found: {0}")]
	NotFound(String),

	#[error("job not ready: {0}")]
	NotReady(String),

	#[error(transparent)]
	Store(StoreError),
}

impl From<StoreError> for JobError {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::Conflict(id) => JobError::Conflict(id),
			StoreError::NotFound(id) => JobError::NotFound(id),
			other => JobError::Store(other),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn store_conflict_maps_to_job_conflict() {
		let err: JobError = StoreError::Conflict("job1".into()).into();
		assert!(matches!(err, JobError::Conflict(id) if id == "job1"));
	}

	#[test]
	fn backend_error_stays_wrapped() {
		let err: JobError = StoreError::Backend("disk full".into()).into();
		assert!(matches!(err, JobError::Store(StoreError::Backend(_))));
		assert_eq!(err.to_string(), "storage backend error: disk full");
	}
}
