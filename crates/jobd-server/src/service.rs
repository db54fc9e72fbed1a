// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-facing job operations used by the HTTP layer.

use std::path::PathBuf;
use std::sync::Arc;

use jobd_core::{validate_job_id, JobError, JobRecord, JobStore, JobSubmission, JobView};
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct JobService {
	store: Arc<dyn JobStore>,
	data_dir: PathBuf,
}

impl JobService {
	pub fn new(store: Arc<dyn JobStore>, data_dir: impl Into<PathBuf>) -> Self {
		Self {
			store,
			data_dir: data_dir.into(),
		}
	}

	/// Validate and persist a new QUEUED job. A duplicate id is a conflict
	/// and leaves the stored record untouched.
	#[instrument(skip(self, submission), fields(job_id = %submission.id, delegate = submission.delegate))]
	pub async fn create_job(&self, submission: JobSubmission) -> Result<JobRecord, JobError> {
		validate_job_id(&submission.id)?;

		let record = JobRecord::new(submission, &self.data_dir);
		self.store.save(&record).await.map_err(|e| {
			warn!(error = %e, "could not create job");
			JobError::from(e)
		})?;

		info!("job queued");
		Ok(record)
	}

	/// Look up a job. Only finished or partially finished jobs are returned;
	/// anything earlier is [`JobError::NotReady`].
	#[instrument(skip(self))]
	pub async fn get_job(&self, id: &str) -> Result<JobView, JobError> {
		let record = self
			.store
			.get(id)
			.await
			.inspect_err(|e| warn!(job_id = %id, error = %e, "could not load job"))?
			.ok_or_else(|| JobError::NotFound(id.to_string()))?;

		if !record.status.is_ready() {
			return Err(JobError::NotReady(format!("{id} is {}", record.status)));
		}
		Ok(record.view())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use jobd_core::{JobStatus, MemoryJobStore};

	fn service() -> (JobService, Arc<MemoryJobStore>) {
		let store = Arc::new(MemoryJobStore::new());
		(JobService::new(store.clone(), "/var/lib/jobd"), store)
	}

	fn submission(id: &str, input: &str) -> JobSubmission {
		JobSubmission {
			id: id.to_string(),
			input: input.to_string(),
			delegate: false,
		}
	}

	#[tokio::test]
	async fn create_job_places_working_path_under_data_dir() {
		let (service, _) = service();
		let record = service.create_job(submission("job1", "abc")).await.unwrap();

		assert_eq!(record.status, JobStatus::Queued);
		assert_eq!(record.working_path, PathBuf::from("/var/lib/jobd/job1"));
	}

	#[tokio::test]
	async fn duplicate_create_is_conflict_and_keeps_original() {
		let (service, store) = service();
		service.create_job(submission("job1", "first")).await.unwrap();

		let err = service
			.create_job(submission("job1", "second"))
			.await
			.unwrap_err();
		assert!(matches!(err, JobError::Conflict(_)));

		let stored = store.get("job1").await.unwrap().unwrap();
		assert_eq!(stored.input_payload, "first");
	}

	#[tokio::test]
	async fn missing_id_is_validation_error_and_creates_nothing() {
		let (service, store) = service();
		let err = service.create_job(submission("", "abc")).await.unwrap_err();

		assert!(matches!(err, JobError::Validation(_)));
		assert!(store.is_empty().await);
	}

	#[tokio::test]
	async fn get_job_hides_unfinished_jobs() {
		let (service, _) = service();
		service.create_job(submission("job1", "abc")).await.unwrap();

		assert!(matches!(
			service.get_job("job1").await,
			Err(JobError::NotReady(_))
		));
		assert!(matches!(
			service.get_job("nope").await,
			Err(JobError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn get_job_returns_view_once_finished() {
		let (service, store) = service();
		let mut record = service.create_job(submission("job1", "abc")).await.unwrap();
		record.set_status(JobStatus::Failed).unwrap();
		record.set_message("boom");
		store.write(&record).await.unwrap();

		let view = service.get_job("job1").await.unwrap();
		assert_eq!(view.status, JobStatus::Failed);
		assert_eq!(view.message, "boom");
	}
}
