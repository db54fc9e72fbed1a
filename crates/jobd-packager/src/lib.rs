// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Packaging of job payloads.
//!
//! Job input arrives as a base64 encoded zip archive with a launcher script at
//! its root. Job output is the whole working directory, zipped and encoded the
//! same way. All functions here do blocking filesystem I/O; async callers
//! should run them on a blocking thread.

mod archive;
mod error;

pub use archive::{decode, encode, make_executable, pack, unpack_bytes};
pub use error::{PackagingError, Result};

use std::path::Path;

pub const DEFAULT_LAUNCHER: &str = "run.sh";

/// Unpacks input and packs output for a fixed launcher name.
#[derive(Debug, Clone)]
pub struct Packager {
	launcher: String,
}

impl Default for Packager {
	fn default() -> Self {
		Self::new(DEFAULT_LAUNCHER)
	}
}

impl Packager {
	pub fn new(launcher: impl Into<String>) -> Self {
		Self {
			launcher: launcher.into(),
		}
	}

	pub fn launcher(&self) -> &str {
		&self.launcher
	}

	/// Decode `payload`, extract it into `dest` and check the launcher exists
	/// directly under `dest`.
	pub fn unpack(&self, payload: &str, dest: &Path) -> Result<()> {
		let bytes = decode(payload)?;
		unpack_bytes(&bytes, dest)?;

		if !dest.join(&self.launcher).is_file() {
			return Err(PackagingError::MissingLauncher(self.launcher.clone()));
		}
		Ok(())
	}

	/// Zip `src` and return it base64 encoded.
	pub fn pack(&self, src: &Path) -> Result<String> {
		pack(src).map(|bytes| encode(&bytes))
	}

	/// Mark the launcher under `dir` executable.
	pub fn make_launcher_executable(&self, dir: &Path) -> Result<()> {
		make_executable(&dir.join(&self.launcher))
	}
}
