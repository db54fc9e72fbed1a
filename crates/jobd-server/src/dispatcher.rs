// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded, claim-before-launch dispatch of lifecycle work.
//!
//! Each sweep enumerates candidate records and launches one unit of work per
//! record on a [`TaskTracker`]. Units are gated by a semaphore, registered in
//! an in-flight map keyed by job id, and carry a child cancellation token so
//! that reaping or shutting down can stop them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobd_core::{JobFilter, JobStatus, JobStore, StoreError};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::engine::{LifecycleEngine, LifecycleError};

pub const MSG_INTERRUPTED: &str = "interrupted by daemon restart";

/// Counts produced by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
	/// Records matching the sweep's filter.
	pub found: usize,
	/// Units launched, or records deleted/recovered.
	pub processed: usize,
	/// Records left for a later sweep.
	pub skipped: usize,
	pub failed: usize,
}

struct Unit {
	id: u64,
	token: CancellationToken,
}

#[derive(Default)]
struct InFlight {
	units: Mutex<HashMap<String, Unit>>,
}

impl InFlight {
	fn lock(&self) -> MutexGuard<'_, HashMap<String, Unit>> {
		// A panicking unit only ever held the lock for a map operation.
		self.units.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn contains(&self, job_id: &str) -> bool {
		self.lock().contains_key(job_id)
	}

	fn len(&self) -> usize {
		self.lock().len()
	}

	fn register(
		self: &Arc<Self>,
		job_id: &str,
		unit_id: u64,
		token: CancellationToken,
	) -> Option<UnitGuard> {
		let mut units = self.lock();
		if units.contains_key(job_id) {
			return None;
		}
		units.insert(job_id.to_string(), Unit { id: unit_id, token });
		Some(UnitGuard {
			registry: Arc::clone(self),
			job_id: job_id.to_string(),
			unit_id,
		})
	}

	fn cancel(&self, job_id: &str) -> bool {
		match self.lock().get(job_id) {
			Some(unit) => {
				unit.token.cancel();
				true
			}
			None => false,
		}
	}
}

/// Removes its unit from the in-flight map when the unit finishes.
struct UnitGuard {
	registry: Arc<InFlight>,
	job_id: String,
	unit_id: u64,
}

impl Drop for UnitGuard {
	fn drop(&mut self) {
		let mut units = self.registry.lock();
		if units.get(&self.job_id).is_some_and(|unit| unit.id == self.unit_id) {
			units.remove(&self.job_id);
		}
	}
}

pub struct Dispatcher {
	engine: Arc<LifecycleEngine>,
	store: Arc<dyn JobStore>,
	permits: Arc<Semaphore>,
	tracker: TaskTracker,
	in_flight: Arc<InFlight>,
	shutdown: CancellationToken,
	next_unit: AtomicU64,
}

impl Dispatcher {
	pub fn new(engine: Arc<LifecycleEngine>, max_concurrent_jobs: usize) -> Self {
		let store = Arc::clone(engine.store());
		Self {
			engine,
			store,
			permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
			tracker: TaskTracker::new(),
			in_flight: Arc::new(InFlight::default()),
			shutdown: CancellationToken::new(),
			next_unit: AtomicU64::new(1),
		}
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight.len()
	}

	pub fn is_in_flight(&self, job_id: &str) -> bool {
		self.in_flight.contains(job_id)
	}

	/// Claim every QUEUED record the worker pool has room for and execute it.
	#[instrument(skip(self))]
	pub async fn dispatch_queued(&self) -> Result<SweepReport, StoreError> {
		let queued = self
			.store
			.list(&JobFilter::status(JobStatus::Queued))
			.await
			.inspect_err(|e| warn!(error = %e, "could not list queued jobs"))?;

		let mut report = SweepReport {
			found: queued.len(),
			..Default::default()
		};

		for job in queued {
			let Some((permit, guard, token)) = self.reserve(&job.id) else {
				report.skipped += 1;
				continue;
			};

			let claimed = match self
				.store
				.claim(&job.id, JobStatus::Queued, JobStatus::Claimed)
				.await
			{
				Ok(Some(record)) => record,
				Ok(None) => {
					debug!(job_id = %job.id, "job no longer queued");
					report.skipped += 1;
					continue;
				}
				Err(e) => {
					warn!(job_id = %job.id, error = %e, "could not claim job");
					report.failed += 1;
					continue;
				}
			};

			let engine = Arc::clone(&self.engine);
			self.tracker.spawn(async move {
				let _permit = permit;
				let _guard = guard;
				let job_id = claimed.id.clone();
				match engine.execute(claimed, &token).await {
					Ok(record) => info!(job_id = %job_id, status = %record.status, "job processed"),
					Err(LifecycleError::Reaped(_)) => debug!(job_id = %job_id, "job reaped mid-flight"),
					Err(e) => warn!(job_id = %job_id, error = %e, "job processing stopped"),
				}
			});
			report.processed += 1;
		}

		if report.found > 0 {
			info!(
				found = report.found,
				launched = report.processed,
				skipped = report.skipped,
				failed = report.failed,
				"dispatch sweep complete"
			);
		}
		Ok(report)
	}

	/// Refresh every delegated RUNNING or PARTIAL record not already in flight.
	#[instrument(skip(self))]
	pub async fn poll_delegated(&self) -> Result<SweepReport, StoreError> {
		let filter = JobFilter {
			statuses: Some(vec![JobStatus::Running, JobStatus::Partial]),
			delegate: Some(true),
			updated_before: None,
		};
		let delegated = self
			.store
			.list(&filter)
			.await
			.inspect_err(|e| warn!(error = %e, "could not list delegated jobs"))?;

		let mut report = SweepReport {
			found: delegated.len(),
			..Default::default()
		};

		for job in delegated {
			let Some((permit, guard, token)) = self.reserve(&job.id) else {
				report.skipped += 1;
				continue;
			};

			let engine = Arc::clone(&self.engine);
			self.tracker.spawn(async move {
				let _permit = permit;
				let _guard = guard;
				let job_id = job.id.clone();
				tokio::select! {
					biased;
					_ = token.cancelled() => debug!(job_id = %job_id, "poll cancelled"),
					result = engine.refresh_delegated(job) => match result {
						Ok(record) => debug!(job_id = %job_id, status = %record.status, "poll processed"),
						Err(LifecycleError::Reaped(_)) => debug!(job_id = %job_id, "job reaped mid-poll"),
						Err(e) => warn!(job_id = %job_id, error = %e, "poll failed"),
					},
				}
			});
			report.processed += 1;
		}

		Ok(report)
	}

	/// Delete every record not updated within `retention`.
	pub async fn reap_expired(&self, retention: Duration) -> Result<SweepReport, StoreError> {
		let cutoff = chrono::Duration::from_std(retention)
			.ok()
			.and_then(|retention| Utc::now().checked_sub_signed(retention));
		match cutoff {
			Some(cutoff) => self.reap_updated_before(cutoff).await,
			None => {
				debug!(?retention, "retention reaches before the epoch, nothing to reap");
				Ok(SweepReport::default())
			}
		}
	}

	/// Delete every record last updated before `cutoff`, whatever its status.
	/// In-flight units for deleted records are cancelled.
	#[instrument(skip(self), fields(cutoff = %cutoff))]
	pub async fn reap_updated_before(
		&self,
		cutoff: DateTime<Utc>,
	) -> Result<SweepReport, StoreError> {
		let filter = JobFilter {
			updated_before: Some(cutoff),
			..Default::default()
		};
		let expired = self
			.store
			.list(&filter)
			.await
			.inspect_err(|e| warn!(error = %e, "could not list expired jobs"))?;

		let mut report = SweepReport {
			found: expired.len(),
			..Default::default()
		};

		for job in expired {
			match self.store.delete(&job.id).await {
				Ok(true) => {
					if self.in_flight.cancel(&job.id) {
						info!(job_id = %job.id, status = %job.status, "cancelled in-flight unit of reaped job");
					}
					remove_workdir(&job.working_path).await;
					report.processed += 1;
				}
				Ok(false) => report.skipped += 1,
				Err(e) => {
					warn!(job_id = %job.id, error = %e, "could not delete expired job");
					report.failed += 1;
				}
			}
		}

		if report.found > 0 {
			info!(
				deleted = report.processed,
				failed = report.failed,
				"reap sweep complete"
			);
		}
		Ok(report)
	}

	/// Fail records a previous process left half-way through local
	/// processing. Delegated RUNNING records are left for the poll sweep.
	#[instrument(skip(self))]
	pub async fn recover_interrupted(&self) -> Result<SweepReport, StoreError> {
		let filter = JobFilter {
			statuses: Some(vec![
				JobStatus::Claimed,
				JobStatus::Prepared,
				JobStatus::Running,
			]),
			..Default::default()
		};
		let candidates = self.store.list(&filter).await?;

		let mut report = SweepReport::default();
		for mut job in candidates {
			if job.status == JobStatus::Running && job.delegate {
				continue;
			}
			report.found += 1;
			if let Err(from) = job.set_status(JobStatus::Failed) {
				warn!(job_id = %job.id, status = %from, "cannot fail interrupted job");
				report.skipped += 1;
				continue;
			}
			job.set_message(MSG_INTERRUPTED);
			match self.store.update(&job).await {
				Ok(_) => report.processed += 1,
				Err(e) => {
					warn!(job_id = %job.id, error = %e, "could not fail interrupted job");
					report.failed += 1;
				}
			}
		}

		if report.processed > 0 {
			warn!(recovered = report.processed, "failed jobs interrupted by a restart");
		}
		Ok(report)
	}

	/// Wait until every launched unit has finished.
	pub async fn wait_idle(&self) {
		self.tracker.close();
		self.tracker.wait().await;
		self.tracker.reopen();
	}

	/// Cancel all in-flight units and wait for them. Nothing is launched
	/// afterwards.
	pub async fn shutdown(&self) {
		info!(in_flight = self.in_flight(), "shutting down dispatcher");
		self.shutdown.cancel();
		self.tracker.close();
		self.tracker.wait().await;
	}

	fn reserve(&self, job_id: &str) -> Option<(OwnedSemaphorePermit, UnitGuard, CancellationToken)> {
		if self.shutdown.is_cancelled() || self.in_flight.contains(job_id) {
			return None;
		}
		let permit = match Arc::clone(&self.permits).try_acquire_owned() {
			Ok(permit) => permit,
			Err(_) => {
				debug!(job_id = %job_id, "worker pool full, deferring");
				return None;
			}
		};
		let token = self.shutdown.child_token();
		let unit_id = self.next_unit.fetch_add(1, Ordering::Relaxed);
		let guard = self.in_flight.register(job_id, unit_id, token.clone())?;
		Some((permit, guard, token))
	}
}

async fn remove_workdir(dir: &Path) {
	match tokio::fs::remove_dir_all(dir).await {
		Ok(()) => debug!(dir = %dir.display(), "removed working directory"),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
		Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove working directory"),
	}
}
