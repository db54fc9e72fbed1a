// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence contract for job records.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::error::StoreError;
use crate::record::{JobRecord, JobStatus};

/// Selection criteria for [`JobStore::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
	pub statuses: Option<Vec<JobStatus>>,
	pub delegate: Option<bool>,
	/// Only records whose `last_updated` is strictly before this instant.
	pub updated_before: Option<DateTime<Utc>>,
}

impl JobFilter {
	pub fn status(status: JobStatus) -> Self {
		Self {
			statuses: Some(vec![status]),
			..Default::default()
		}
	}

	pub fn matches(&self, record: &JobRecord) -> bool {
		if let Some(statuses) = &self.statuses {
			if !statuses.contains(&record.status) {
				return false;
			}
		}
		if let Some(delegate) = self.delegate {
			if record.delegate != delegate {
				return false;
			}
		}
		if let Some(cutoff) = self.updated_before {
			if record.last_updated >= cutoff {
				return false;
			}
		}
		true
	}
}

#[async_trait]
pub trait JobStore: Send + Sync {
	async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError>;

	/// Insert a new record. Fails with [`StoreError::Conflict`] if the id exists.
	async fn save(&self, record: &JobRecord) -> Result<(), StoreError>;

	/// Unconditional upsert.
	async fn write(&self, record: &JobRecord) -> Result<(), StoreError>;

	/// Write `record` only if the stored version still equals `record.version`.
	/// Returns the stored record with its bumped version.
	async fn update(&self, record: &JobRecord) -> Result<JobRecord, StoreError>;

	/// Atomically move a record from `from` to `to`. `None` if the record is
	/// missing or not in `from`.
	async fn claim(
		&self,
		id: &str,
		from: JobStatus,
		to: JobStatus,
	) -> Result<Option<JobRecord>, StoreError>;

	async fn delete(&self, id: &str) -> Result<bool, StoreError>;

	async fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError>;
}

/// Process-local store, used by tests and single-shot tooling.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
	jobs: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.jobs.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.jobs.read().await.is_empty()
	}
}

#[async_trait]
impl JobStore for MemoryJobStore {
	async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
		Ok(self.jobs.read().await.get(id).cloned())
	}

	#[instrument(skip(self, record), fields(job_id = %record.id))]
	async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
		let mut jobs = self.jobs.write().await;
		if jobs.contains_key(&record.id) {
			return Err(StoreError::Conflict(record.id.clone()));
		}
		jobs.insert(record.id.clone(), record.clone());
		Ok(())
	}

	async fn write(&self, record: &JobRecord) -> Result<(), StoreError> {
		self.jobs
			.write()
			.await
			.insert(record.id.clone(), record.clone());
		Ok(())
	}

	#[instrument(skip(self, record), fields(job_id = %record.id, version = record.version))]
	async fn update(&self, record: &JobRecord) -> Result<JobRecord, StoreError> {
		let mut jobs = self.jobs.write().await;
		let stored = jobs
			.get_mut(&record.id)
			.ok_or_else(|| StoreError::NotFound(record.id.clone()))?;
		if stored.version != record.version {
			return Err(StoreError::VersionMismatch {
				id: record.id.clone(),
				expected: record.version,
			});
		}
		let mut next = record.clone();
		next.version += 1;
		*stored = next.clone();
		Ok(next)
	}

	#[instrument(skip(self), fields(job_id = %id, from = %from, to = %to))]
	async fn claim(
		&self,
		id: &str,
		from: JobStatus,
		to: JobStatus,
	) -> Result<Option<JobRecord>, StoreError> {
		let mut jobs = self.jobs.write().await;
		let Some(stored) = jobs.get_mut(id) else {
			return Ok(None);
		};
		if stored.status != from {
			return Ok(None);
		}
		stored.status = to;
		stored.last_updated = Utc::now();
		stored.version += 1;
		Ok(Some(stored.clone()))
	}

	async fn delete(&self, id: &str) -> Result<bool, StoreError> {
		Ok(self.jobs.write().await.remove(id).is_some())
	}

	async fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError> {
		let jobs = self.jobs.read().await;
		let mut matched: Vec<JobRecord> = jobs
			.values()
			.filter(|record| filter.matches(record))
			.cloned()
			.collect();
		matched.sort_by(|a, b| a.last_updated.cmp(&b.last_updated).then(a.id.cmp(&b.id)));
		Ok(matched)
	}
}
