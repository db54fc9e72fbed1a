// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Drives a job record through its lifecycle.
//!
//! Job-level failures (bad archive, failing script, rejected submission,
//! remote failure) are recorded on the record as FAILED with a diagnostic
//! message. An `Err` from the engine means the record itself could not be
//! advanced: it was reaped, changed underneath us, is in the wrong state, or
//! the store failed. `prepare` also returns its packaging error after
//! recording it.

use std::path::Path;
use std::sync::Arc;

use jobd_config::DaemonConfig;
use jobd_core::{JobRecord, JobStatus, JobStore, StoreError};
use jobd_delegate::{DelegateClient, PollOutcome};
use jobd_packager::{Packager, PackagingError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::executor::LocalExecutor;

pub const MSG_SUCCESS: &str = "job finished successfully";

#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error(transparent)]
	Packaging(#[from] PackagingError),

	#[error("job {0} was removed while being processed")]
	Reaped(String),

	#[error("job {id} cannot move from {from} to {to}")]
	InvalidState {
		id: String,
		from: JobStatus,
		to: JobStatus,
	},

	#[error(transparent)]
	Store(StoreError),

	#[error("background task failed: {0}")]
	Task(String),
}

impl From<StoreError> for LifecycleError {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::NotFound(id) => LifecycleError::Reaped(id),
			other => LifecycleError::Store(other),
		}
	}
}

pub struct LifecycleEngine {
	store: Arc<dyn JobStore>,
	packager: Packager,
	executor: LocalExecutor,
	delegate: DelegateClient,
	keep_workdir: bool,
}

impl LifecycleEngine {
	pub fn new(
		store: Arc<dyn JobStore>,
		packager: Packager,
		executor: LocalExecutor,
		delegate: DelegateClient,
	) -> Self {
		Self {
			store,
			packager,
			executor,
			delegate,
			keep_workdir: false,
		}
	}

	/// Build an engine from the daemon's execution and delegate settings.
	pub fn from_config(config: &DaemonConfig, store: Arc<dyn JobStore>) -> Self {
		Self::new(
			store,
			Packager::new(config.execution.launcher.clone()),
			LocalExecutor::new(config.execution.timeout()),
			DelegateClient::new(&config.delegate),
		)
		.keep_workdir(config.execution.keep_workdir)
	}

	/// Leave working directories in place after a job finishes.
	pub fn keep_workdir(mut self, keep: bool) -> Self {
		self.keep_workdir = keep;
		self
	}

	pub fn store(&self) -> &Arc<dyn JobStore> {
		&self.store
	}

	/// Create the working directory, unpack the input into it and make the
	/// launcher executable. On failure the record is FAILED and the working
	/// directory is left for inspection, unless the record was reaped.
	#[instrument(skip(self, job), fields(job_id = %job.id))]
	pub async fn prepare(&self, mut job: JobRecord) -> Result<JobRecord, LifecycleError> {
		ensure_transition(&job, JobStatus::Prepared)?;

		let payload = job.input_payload.clone();
		let dest = job.working_path.clone();
		let packager = self.packager.clone();
		let unpacked = tokio::task::spawn_blocking(move || {
			std::fs::create_dir_all(&dest).map_err(|source| PackagingError::Io {
				path: dest.clone(),
				source,
			})?;
			packager.unpack(&payload, &dest)?;
			packager.make_launcher_executable(&dest)
		})
		.await
		.map_err(|e| LifecycleError::Task(e.to_string()))?;

		if let Err(e) = unpacked {
			let message = match &e {
				PackagingError::MissingLauncher(_) => e.to_string(),
				other => format!("could not unzip file, is it base64 encoded? error: {other}"),
			};
			warn!(error = %e, "job input could not be prepared");
			job.append_message(&message);
			transition(&mut job, JobStatus::Failed)?;
			self.persist(&job).await?;
			return Err(e.into());
		}

		transition(&mut job, JobStatus::Prepared)?;
		self.persist(&job).await
	}

	/// Prepare the job, then run it locally or hand it to the delegate.
	#[instrument(skip(self, job, cancel), fields(job_id = %job.id, delegate = job.delegate))]
	pub async fn execute(
		&self,
		job: JobRecord,
		cancel: &CancellationToken,
	) -> Result<JobRecord, LifecycleError> {
		let job = self.prepare(job).await?;
		if job.delegate {
			self.submit_remote(job).await
		} else {
			self.run_local(job, cancel).await
		}
	}

	async fn run_local(
		&self,
		mut job: JobRecord,
		cancel: &CancellationToken,
	) -> Result<JobRecord, LifecycleError> {
		transition(&mut job, JobStatus::Running)?;
		let mut job = self.persist(&job).await?;

		let result = self
			.executor
			.run(&job.working_path, self.packager.launcher(), cancel)
			.await;

		// Output is captured whatever the script did.
		let src = job.working_path.clone();
		let packager = self.packager.clone();
		let packed = tokio::task::spawn_blocking(move || packager.pack(&src))
			.await
			.map_err(|e| LifecycleError::Task(e.to_string()))?;

		self.cleanup(&job.working_path).await;

		let (status, message) = match (&result, packed) {
			(Ok(_), Ok(output)) => {
				job.set_output(output);
				(JobStatus::Success, MSG_SUCCESS.to_string())
			}
			(Ok(_), Err(e)) => (
				JobStatus::Failed,
				format!("could not package job output, error: {e}"),
			),
			(Err(e), Ok(output)) => {
				job.set_output(output);
				(JobStatus::Failed, format!("could not finish the job, error: {e}"))
			}
			(Err(e), Err(pack_err)) => (
				JobStatus::Failed,
				format!(
					"could not finish the job, error: {e}; could not package job output, error: {pack_err}"
				),
			),
		};

		if let Ok(outcome) = &result {
			debug!(duration_ms = outcome.duration.as_millis() as u64, "local run finished");
		}
		info!(status = %status, "local job finished");
		job.set_message(message);
		transition(&mut job, status)?;
		self.persist(&job).await
	}

	async fn submit_remote(&self, mut job: JobRecord) -> Result<JobRecord, LifecycleError> {
		let submitted = self.delegate.submit(&job.input_payload).await;
		self.cleanup(&job.working_path).await;

		match submitted {
			Ok(remote_id) => {
				info!(remote_id, "job submitted to delegate");
				job.set_remote_id(remote_id);
				job.set_message(format!("submitted to remote service as {remote_id}"));
				transition(&mut job, JobStatus::Running)?;
			}
			Err(e) => {
				warn!(error = %e, "delegate submission failed");
				job.set_message(format!("could not submit the job, error: {e}"));
				transition(&mut job, JobStatus::Failed)?;
			}
		}
		self.persist(&job).await
	}

	/// Poll the delegate for a RUNNING or PARTIAL delegated job and apply
	/// the answer. A not-ready answer leaves the record untouched.
	#[instrument(skip(self, job), fields(job_id = %job.id, remote_id = ?job.remote_id))]
	pub async fn refresh_delegated(&self, mut job: JobRecord) -> Result<JobRecord, LifecycleError> {
		if !job.delegate || !matches!(job.status, JobStatus::Running | JobStatus::Partial) {
			return Err(LifecycleError::InvalidState {
				id: job.id.clone(),
				from: job.status,
				to: JobStatus::Partial,
			});
		}

		let Some(remote_id) = job.remote_id else {
			job.set_message("delegated job has no remote id");
			transition(&mut job, JobStatus::Failed)?;
			return self.persist(&job).await;
		};

		let outcome = match self.delegate.poll(remote_id).await {
			Ok(outcome) => outcome,
			Err(e) => PollOutcome::Failed(format!("could not poll the remote service, error: {e}")),
		};

		match outcome {
			PollOutcome::NotReady => {
				debug!("remote job not ready");
				return Ok(job);
			}
			PollOutcome::Partial(output) => {
				job.set_output(output);
				job.set_message("partial output available");
				transition(&mut job, JobStatus::Partial)?;
			}
			PollOutcome::Complete(output) => {
				job.set_output(output);
				job.set_message(MSG_SUCCESS);
				transition(&mut job, JobStatus::Success)?;
			}
			PollOutcome::Failed(reason) => {
				warn!(reason = %reason, "remote job failed");
				job.set_message(reason);
				transition(&mut job, JobStatus::Failed)?;
			}
		}

		info!(status = %job.status, "delegated job refreshed");
		self.persist(&job).await
	}

	/// Write the record back. A reaped record takes its working directory
	/// with it, whatever `keep_workdir` says.
	async fn persist(&self, job: &JobRecord) -> Result<JobRecord, LifecycleError> {
		match self.store.update(job).await {
			Ok(stored) => Ok(stored),
			Err(StoreError::NotFound(id)) => {
				warn!(job_id = %job.id, "job was reaped, abandoning");
				remove_dir(&job.working_path).await;
				Err(LifecycleError::Reaped(id))
			}
			Err(e) => {
				warn!(job_id = %job.id, error = %e, "could not persist job");
				Err(e.into())
			}
		}
	}

	async fn cleanup(&self, dir: &Path) {
		if self.keep_workdir {
			debug!(dir = %dir.display(), "keeping working directory");
			return;
		}
		remove_dir(dir).await;
	}
}

async fn remove_dir(dir: &Path) {
	match tokio::fs::remove_dir_all(dir).await {
		Ok(()) => debug!(dir = %dir.display(), "working directory removed"),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
		Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove working directory"),
	}
}

fn ensure_transition(job: &JobRecord, next: JobStatus) -> Result<(), LifecycleError> {
	if job.status.can_transition_to(next) {
		Ok(())
	} else {
		Err(LifecycleError::InvalidState {
			id: job.id.clone(),
			from: job.status,
			to: next,
		})
	}
}

fn transition(job: &mut JobRecord, next: JobStatus) -> Result<(), LifecycleError> {
	job.set_status(next).map_err(|from| LifecycleError::InvalidState {
		id: job.id.clone(),
		from,
		to: next,
	})
}
