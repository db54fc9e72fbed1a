// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local execution configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_LAUNCHER: &str = "run.sh";

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
	/// Script that must sit at the root of every input archive.
	pub launcher: String,
	/// Wall-clock limit for a local run. `None` means no limit.
	pub timeout_secs: Option<u64>,
	/// Keep job working directories after completion (debugging aid).
	pub keep_workdir: bool,
}

impl ExecutionConfig {
	pub fn timeout(&self) -> Option<Duration> {
		self.timeout_secs.map(Duration::from_secs)
	}
}

impl Default for ExecutionConfig {
	fn default() -> Self {
		Self {
			launcher: DEFAULT_LAUNCHER.to_string(),
			timeout_secs: None,
			keep_workdir: false,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionConfigLayer {
	#[serde(default)]
	pub launcher: Option<String>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
	#[serde(default)]
	pub keep_workdir: Option<bool>,
}

impl ExecutionConfigLayer {
	pub fn merge(&mut self, other: ExecutionConfigLayer) {
		if other.launcher.is_some() {
			self.launcher = other.launcher;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.keep_workdir.is_some() {
			self.keep_workdir = other.keep_workdir;
		}
	}

	pub fn finalize(self) -> ExecutionConfig {
		ExecutionConfig {
			launcher: self
				.launcher
				.unwrap_or_else(|| DEFAULT_LAUNCHER.to_string()),
			// 0 disables the deadline
			timeout_secs: self.timeout_secs.filter(|secs| *secs > 0),
			keep_workdir: self.keep_workdir.unwrap_or(false),
		}
	}
}
