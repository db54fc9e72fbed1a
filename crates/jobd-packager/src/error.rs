// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackagingError>;

#[derive(Debug, Error)]
pub enum PackagingError {
	#[error("payload is not valid base64: {0}")]
	Decode(#[from] base64::DecodeError),

	#[error("invalid archive: {0}")]
	Archive(#[from] zip::result::ZipError),

	#[error("archive entry escapes the destination: {0}")]
	UnsafeEntry(String),

	#[error("{0} does not exist in the input file")]
	MissingLauncher(String),

	#[error("directory does not exist: {0}")]
	SourceMissing(PathBuf),

	#[error("i/o error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

impl PackagingError {
	pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
		let path = path.into();
		move |source| PackagingError::Io { path, source }
	}
}
