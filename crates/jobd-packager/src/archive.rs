// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, trace};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{PackagingError, Result};

pub fn encode(bytes: &[u8]) -> String {
	STANDARD.encode(bytes)
}

pub fn decode(payload: &str) -> Result<Vec<u8>> {
	Ok(STANDARD.decode(payload.trim())?)
}

/// Extract a zip archive into `dest`.
///
/// Entries that would land outside `dest` are rejected before anything is
/// written for them. Existing files are overwritten.
pub fn unpack_bytes(bytes: &[u8], dest: &Path) -> Result<()> {
	let mut archive = ZipArchive::new(Cursor::new(bytes))?;
	fs::create_dir_all(dest).map_err(PackagingError::io(dest))?;

	for i in 0..archive.len() {
		let mut entry = archive.by_index(i)?;
		let Some(relative) = entry.enclosed_name() else {
			return Err(PackagingError::UnsafeEntry(entry.name().to_string()));
		};
		let target = dest.join(relative);

		if entry.is_dir() {
			fs::create_dir_all(&target).map_err(PackagingError::io(&target))?;
			continue;
		}

		if let Some(parent) = target.parent() {
			fs::create_dir_all(parent).map_err(PackagingError::io(parent))?;
		}
		if target.is_dir() {
			fs::remove_dir_all(&target).map_err(PackagingError::io(&target))?;
		}

		let mut out = fs::File::create(&target).map_err(PackagingError::io(&target))?;
		io::copy(&mut entry, &mut out).map_err(PackagingError::io(&target))?;
		trace!(path = %target.display(), size = entry.size(), "extracted entry");

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			if let Some(mode) = entry.unix_mode() {
				fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
					.map_err(PackagingError::io(&target))?;
			}
		}
	}

	debug!(entries = archive.len(), dest = %dest.display(), "archive extracted");
	Ok(())
}

/// Zip every regular file under `src`, keyed by its `/`-separated path
/// relative to `src`. Directories are not stored.
pub fn pack(src: &Path) -> Result<Vec<u8>> {
	if !src.is_dir() {
		return Err(PackagingError::SourceMissing(src.to_path_buf()));
	}

	let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
	let mut count = 0usize;
	add_dir(&mut writer, src, src, &mut count)?;
	let bytes = writer.finish()?.into_inner();

	debug!(files = count, size = bytes.len(), src = %src.display(), "directory packed");
	Ok(bytes)
}

fn add_dir(
	writer: &mut ZipWriter<Cursor<Vec<u8>>>,
	root: &Path,
	dir: &Path,
	count: &mut usize,
) -> Result<()> {
	let mut entries = fs::read_dir(dir)
		.map_err(PackagingError::io(dir))?
		.collect::<io::Result<Vec<_>>>()
		.map_err(PackagingError::io(dir))?;
	entries.sort_by_key(|e| e.file_name());

	for entry in entries {
		let path = entry.path();
		let file_type = entry.file_type().map_err(PackagingError::io(&path))?;

		if file_type.is_dir() {
			add_dir(writer, root, &path, count)?;
		} else if file_type.is_file() {
			add_file(writer, root, &path)?;
			*count += 1;
		}
	}
	Ok(())
}

fn add_file(writer: &mut ZipWriter<Cursor<Vec<u8>>>, root: &Path, path: &Path) -> Result<()> {
	let relative = path
		.strip_prefix(root)
		.map_err(|_| PackagingError::UnsafeEntry(path.display().to_string()))?;
	let name = relative
		.components()
		.map(|c| c.as_os_str().to_string_lossy())
		.collect::<Vec<_>>()
		.join("/");

	let mut options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let mode = fs::metadata(path)
			.map_err(PackagingError::io(path))?
			.permissions()
			.mode();
		options = options.unix_permissions(mode & 0o7777);
	}

	writer.start_file(name, options)?;
	let mut file = fs::File::open(path).map_err(PackagingError::io(path))?;
	io::copy(&mut file, writer).map_err(PackagingError::io(path))?;
	writer.flush().map_err(PackagingError::io(path))?;
	Ok(())
}

/// `chmod 0775` on unix; a no-op elsewhere.
pub fn make_executable(path: &Path) -> Result<()> {
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		fs::set_permissions(path, fs::Permissions::from_mode(0o775))
			.map_err(PackagingError::io(path))?;
	}
	#[cfg(not(unix))]
	{
		if !path.exists() {
			return Err(PackagingError::io(path)(io::Error::from(io::ErrorKind::NotFound)));
		}
	}
	Ok(())
}
