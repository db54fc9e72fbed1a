// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use jobd_core::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Internal: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for StoreError {
	fn from(e: DbError) -> Self {
		StoreError::Backend(e.to_string())
	}
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Database(db) => db.is_unique_violation(),
		_ => false,
	}
}
