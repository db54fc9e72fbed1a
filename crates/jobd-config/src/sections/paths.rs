// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filesystem and database locations.

use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_DATABASE_URL: &str = "sqlite:./jobd.db";

/// Paths configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
	/// Base directory under which every job gets `<data_dir>/<job id>`.
	pub data_dir: PathBuf,
	pub database_url: String,
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self {
			data_dir: PathBuf::from(DEFAULT_DATA_DIR),
			database_url: DEFAULT_DATABASE_URL.to_string(),
		}
	}
}

/// Paths configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfigLayer {
	#[serde(default)]
	pub data_dir: Option<PathBuf>,
	#[serde(default)]
	pub database_url: Option<String>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: PathsConfigLayer) {
		if other.data_dir.is_some() {
			self.data_dir = other.data_dir;
		}
		if other.database_url.is_some() {
			self.database_url = other.database_url;
		}
	}

	pub fn finalize(self) -> PathsConfig {
		PathsConfig {
			data_dir: self
				.data_dir
				.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
			database_url: self
				.database_url
				.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
		}
	}
}
