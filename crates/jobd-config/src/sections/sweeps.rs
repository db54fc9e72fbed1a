// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dispatch, poll and reap sweep configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepsConfig {
	pub dispatch_interval_secs: u64,
	pub poll_interval_secs: u64,
	pub reap_interval_secs: u64,
	/// Records not updated for this long are deleted by the reap sweep.
	pub retention_hours: u64,
	pub max_concurrent_jobs: usize,
}

impl SweepsConfig {
	pub fn dispatch_interval(&self) -> Duration {
		Duration::from_secs(self.dispatch_interval_secs)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_secs)
	}

	pub fn reap_interval(&self) -> Duration {
		Duration::from_secs(self.reap_interval_secs)
	}

	pub fn retention(&self) -> Duration {
		Duration::from_secs(self.retention_hours.saturating_mul(3600))
	}
}

impl Default for SweepsConfig {
	fn default() -> Self {
		Self {
			dispatch_interval_secs: 1,
			poll_interval_secs: 30,
			reap_interval_secs: 3600,
			retention_hours: 48,
			max_concurrent_jobs: 8,
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SweepsConfigLayer {
	pub dispatch_interval_secs: Option<u64>,
	pub poll_interval_secs: Option<u64>,
	pub reap_interval_secs: Option<u64>,
	pub retention_hours: Option<u64>,
	pub max_concurrent_jobs: Option<usize>,
}

impl SweepsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.dispatch_interval_secs.is_some() {
			self.dispatch_interval_secs = other.dispatch_interval_secs;
		}
		if other.poll_interval_secs.is_some() {
			self.poll_interval_secs = other.poll_interval_secs;
		}
		if other.reap_interval_secs.is_some() {
			self.reap_interval_secs = other.reap_interval_secs;
		}
		if other.retention_hours.is_some() {
			self.retention_hours = other.retention_hours;
		}
		if other.max_concurrent_jobs.is_some() {
			self.max_concurrent_jobs = other.max_concurrent_jobs;
		}
	}

	pub fn finalize(self) -> SweepsConfig {
		let defaults = SweepsConfig::default();
		SweepsConfig {
			dispatch_interval_secs: self
				.dispatch_interval_secs
				.unwrap_or(defaults.dispatch_interval_secs),
			poll_interval_secs: self.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
			reap_interval_secs: self.reap_interval_secs.unwrap_or(defaults.reap_interval_secs),
			retention_hours: self.retention_hours.unwrap_or(defaults.retention_hours),
			max_concurrent_jobs: self
				.max_concurrent_jobs
				.unwrap_or(defaults.max_concurrent_jobs),
		}
	}
}
