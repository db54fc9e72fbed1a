// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema bootstrap. Statements are idempotent.

use sqlx::SqlitePool;

use crate::error::Result;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS jobs (
		id TEXT PRIMARY KEY,
		status TEXT NOT NULL,
		working_path TEXT NOT NULL,
		input_payload TEXT NOT NULL,
		output_payload TEXT,
		message TEXT NOT NULL DEFAULT '',
		delegate INTEGER NOT NULL DEFAULT 0,
		remote_id INTEGER,
		last_updated TEXT NOT NULL,
		version INTEGER NOT NULL DEFAULT 0
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)",
	"CREATE INDEX IF NOT EXISTS idx_jobs_last_updated ON jobs(last_updated)",
];

#[tracing::instrument(skip(pool))]
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
	for statement in STATEMENTS {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!("jobs schema ready");
	Ok(())
}
