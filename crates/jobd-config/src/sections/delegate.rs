// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote batch service (delegate) configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::secret::SecretString;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SUBMIT_ATTEMPTS: u32 = 1;

/// Delegate configuration (runtime, fully resolved).
///
/// Endpoint and token stay optional here: a daemon without a delegate still
/// runs local jobs, and delegated jobs fail at submission time.
#[derive(Debug, Clone, PartialEq)]
pub struct DelegateConfig {
	pub endpoint: Option<String>,
	pub token: Option<SecretString>,
	pub request_timeout_secs: u64,
	/// Total submission attempts. `1` fails fast on the first error.
	pub submit_attempts: u32,
}

impl DelegateConfig {
	pub fn is_configured(&self) -> bool {
		self.endpoint.is_some() && self.token.is_some()
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}

impl Default for DelegateConfig {
	fn default() -> Self {
		Self {
			endpoint: None,
			token: None,
			request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
			submit_attempts: DEFAULT_SUBMIT_ATTEMPTS,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DelegateConfigLayer {
	#[serde(default)]
	pub endpoint: Option<String>,
	#[serde(default)]
	pub token: Option<SecretString>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	#[serde(default)]
	pub submit_attempts: Option<u32>,
}

impl DelegateConfigLayer {
	pub fn merge(&mut self, other: DelegateConfigLayer) {
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.token.is_some() {
			self.token = other.token;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.submit_attempts.is_some() {
			self.submit_attempts = other.submit_attempts;
		}
	}

	pub fn finalize(self) -> DelegateConfig {
		DelegateConfig {
			endpoint: self
				.endpoint
				.map(|e| e.trim_end_matches('/').to_string())
				.filter(|e| !e.is_empty()),
			token: self.token.filter(|t| !t.expose().is_empty()),
			request_timeout_secs: self
				.request_timeout_secs
				.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
			submit_attempts: self.submit_attempts.unwrap_or(DEFAULT_SUBMIT_ATTEMPTS),
		}
	}
}
