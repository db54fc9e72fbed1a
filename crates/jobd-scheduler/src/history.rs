// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded in-memory record of sweep runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::types::{RunStatus, SweepRun};

pub const DEFAULT_RUNS_PER_SWEEP: usize = 50;

pub struct RunHistory {
	runs: Mutex<HashMap<String, VecDeque<SweepRun>>>,
	capacity: usize,
	next_id: AtomicU64,
}

impl Default for RunHistory {
	fn default() -> Self {
		Self::new(DEFAULT_RUNS_PER_SWEEP)
	}
}

impl RunHistory {
	pub fn new(capacity: usize) -> Self {
		Self {
			runs: Mutex::new(HashMap::new()),
			capacity: capacity.max(1),
			next_id: AtomicU64::new(1),
		}
	}

	pub fn next_run_id(&self, sweep_id: &str) -> String {
		let n = self.next_id.fetch_add(1, Ordering::Relaxed);
		format!("{sweep_id}-{n}")
	}

	pub async fn record_run_start(&self, run: &SweepRun) {
		let mut runs = self.runs.lock().await;
		let entries = runs.entry(run.sweep_id.clone()).or_default();
		entries.push_back(run.clone());
		while entries.len() > self.capacity {
			entries.pop_front();
		}
	}

	pub async fn record_run_complete(
		&self,
		sweep_id: &str,
		run_id: &str,
		status: RunStatus,
		error_message: Option<String>,
		metadata: Option<serde_json::Value>,
		retry_count: u32,
	) {
		let mut runs = self.runs.lock().await;
		let Some(run) = runs
			.get_mut(sweep_id)
			.and_then(|entries| entries.iter_mut().rev().find(|r| r.id == run_id))
		else {
			return;
		};

		let now = Utc::now();
		run.status = status;
		run.completed_at = Some(now);
		run.duration_ms = Some((now - run.started_at).num_milliseconds());
		run.error_message = error_message;
		run.metadata = metadata;
		run.retry_count = retry_count;
	}

	pub async fn last_run(&self, sweep_id: &str) -> Option<SweepRun> {
		let runs = self.runs.lock().await;
		runs.get(sweep_id).and_then(|entries| entries.back().cloned())
	}

	/// Newest run that has finished, skipping any still in progress.
	pub async fn last_completed_run(&self, sweep_id: &str) -> Option<SweepRun> {
		let runs = self.runs.lock().await;
		runs.get(sweep_id).and_then(|entries| {
			entries
				.iter()
				.rev()
				.find(|r| r.status != RunStatus::Running)
				.cloned()
		})
	}

	/// Most recent first.
	pub async fn recent_runs(&self, sweep_id: &str, limit: usize) -> Vec<SweepRun> {
		let runs = self.runs.lock().await;
		runs.get(sweep_id)
			.map(|entries| entries.iter().rev().take(limit).cloned().collect())
			.unwrap_or_default()
	}

	/// Failed runs since the last non-failed one, ignoring runs in progress.
	pub async fn count_consecutive_failures(&self, sweep_id: &str) -> u32 {
		let runs = self.runs.lock().await;
		let Some(entries) = runs.get(sweep_id) else {
			return 0;
		};
		entries
			.iter()
			.rev()
			.filter(|r| r.status != RunStatus::Running)
			.take_while(|r| r.status == RunStatus::Failed)
			.count() as u32
	}
}
