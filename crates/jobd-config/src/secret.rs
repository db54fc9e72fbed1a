// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret values that never show up in logs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use zeroize::Zeroize;

use crate::error::ConfigError;

pub const REDACTED: &str = "[REDACTED]";

/// A string whose `Debug` and `Display` output is redacted and whose memory
/// is zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Access the underlying value. Keep the borrow short.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl Drop for SecretString {
	fn drop(&mut self) {
		self.0.zeroize();
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(SecretString)
	}
}

/// Load a secret from `NAME`, or from the file named by `NAME_FILE`.
///
/// `NAME` wins when both are set. Empty values count as unset; trailing
/// newlines in secret files are trimmed.
pub fn load_secret_env(name: &str) -> Result<Option<SecretString>, ConfigError> {
	if let Some(value) = std::env::var(name).ok().filter(|v| !v.is_empty()) {
		return Ok(Some(SecretString::new(value)));
	}

	let file_var = format!("{name}_FILE");
	let Some(path) = std::env::var(&file_var).ok().filter(|v| !v.is_empty()) else {
		return Ok(None);
	};

	let path = PathBuf::from(path);
	let content = std::fs::read_to_string(&path)
		.map_err(|e| ConfigError::Secret(format!("{file_var}: cannot read {}: {e}", path.display())))?;
	let trimmed = content.trim_end_matches(['\r', '\n']);
	if trimmed.is_empty() {
		return Ok(None);
	}
	Ok(Some(SecretString::new(trimmed)))
}
