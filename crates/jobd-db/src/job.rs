// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use jobd_core::{JobFilter, JobRecord, JobStatus, JobStore, StoreError};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

use crate::error::{is_unique_violation, DbError};

const COLUMNS: &str = "id, status, working_path, input_payload, output_payload, message, delegate, remote_id, last_updated, version";

/// Fixed-width RFC 3339, so text comparison in SQL orders chronologically.
fn format_ts(ts: &DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[derive(sqlx::FromRow)]
struct JobRow {
	id: String,
	status: String,
	working_path: String,
	input_payload: String,
	output_payload: Option<String>,
	message: String,
	delegate: bool,
	remote_id: Option<i64>,
	last_updated: String,
	version: i64,
}

impl TryFrom<JobRow> for JobRecord {
	type Error = StoreError;

	fn try_from(row: JobRow) -> Result<Self, Self::Error> {
		let status: JobStatus = row
			.status
			.parse()
			.map_err(|e: String| StoreError::Corrupt(format!("{}: {e}", row.id)))?;
		let last_updated = DateTime::parse_from_rfc3339(&row.last_updated)
			.map_err(|e| StoreError::Corrupt(format!("{}: invalid last_updated: {e}", row.id)))?
			.with_timezone(&Utc);
		let version = u64::try_from(row.version)
			.map_err(|_| StoreError::Corrupt(format!("{}: negative version", row.id)))?;

		Ok(JobRecord {
			id: row.id,
			status,
			working_path: PathBuf::from(row.working_path),
			input_payload: row.input_payload,
			output_payload: row.output_payload,
			message: row.message,
			delegate: row.delegate,
			remote_id: row.remote_id,
			last_updated,
			version,
		})
	}
}

fn backend(e: sqlx::Error) -> StoreError {
	DbError::from(e).into()
}

#[derive(Clone)]
pub struct SqliteJobStore {
	pool: SqlitePool,
}

impl SqliteJobStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	async fn exists(&self, id: &str) -> Result<bool, StoreError> {
		let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM jobs WHERE id = ?")
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(backend)?;
		Ok(row.is_some())
	}
}

#[async_trait]
impl JobStore for SqliteJobStore {
	#[instrument(skip(self))]
	async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
		let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {COLUMNS} FROM jobs WHERE id = ?"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await
			.map_err(backend)?;
		row.map(JobRecord::try_from).transpose()
	}

	#[instrument(skip(self, record), fields(job_id = %record.id))]
	async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
		let result = sqlx::query(&format!(
			"INSERT INTO jobs ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
		))
		.bind(&record.id)
		.bind(record.status.as_str())
		.bind(record.working_path.to_string_lossy().into_owned())
		.bind(&record.input_payload)
		.bind(&record.output_payload)
		.bind(&record.message)
		.bind(record.delegate)
		.bind(record.remote_id)
		.bind(format_ts(&record.last_updated))
		.bind(record.version as i64)
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => Ok(()),
			Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(record.id.clone())),
			Err(e) => Err(backend(e)),
		}
	}

	#[instrument(skip(self, record), fields(job_id = %record.id))]
	async fn write(&self, record: &JobRecord) -> Result<(), StoreError> {
		sqlx::query(&format!(
			r#"
			INSERT INTO jobs ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(id) DO UPDATE SET
				status = excluded.status,
				working_path = excluded.working_path,
				input_payload = excluded.input_payload,
				output_payload = excluded.output_payload,
				message = excluded.message,
				delegate = excluded.delegate,
				remote_id = excluded.remote_id,
				last_updated = excluded.last_updated,
				version = excluded.version
			"#
		))
		.bind(&record.id)
		.bind(record.status.as_str())
		.bind(record.working_path.to_string_lossy().into_owned())
		.bind(&record.input_payload)
		.bind(&record.output_payload)
		.bind(&record.message)
		.bind(record.delegate)
		.bind(record.remote_id)
		.bind(format_ts(&record.last_updated))
		.bind(record.version as i64)
		.execute(&self.pool)
		.await
		.map_err(backend)?;

		Ok(())
	}

	#[instrument(skip(self, record), fields(job_id = %record.id, version = record.version))]
	async fn update(&self, record: &JobRecord) -> Result<JobRecord, StoreError> {
		let result = sqlx::query(
			r#"
			UPDATE jobs SET
				status = ?,
				working_path = ?,
				input_payload = ?,
				output_payload = ?,
				message = ?,
				delegate = ?,
				remote_id = ?,
				last_updated = ?,
				version = version + 1
			WHERE id = ? AND version = ?
			"#,
		)
		.bind(record.status.as_str())
		.bind(record.working_path.to_string_lossy().into_owned())
		.bind(&record.input_payload)
		.bind(&record.output_payload)
		.bind(&record.message)
		.bind(record.delegate)
		.bind(record.remote_id)
		.bind(format_ts(&record.last_updated))
		.bind(&record.id)
		.bind(record.version as i64)
		.execute(&self.pool)
		.await
		.map_err(backend)?;

		if result.rows_affected() == 0 {
			if self.exists(&record.id).await? {
				return Err(StoreError::VersionMismatch {
					id: record.id.clone(),
					expected: record.version,
				});
			}
			return Err(StoreError::NotFound(record.id.clone()));
		}

		let mut stored = record.clone();
		stored.version += 1;
		Ok(stored)
	}

	#[instrument(skip(self), fields(from = %from, to = %to))]
	async fn claim(
		&self,
		id: &str,
		from: JobStatus,
		to: JobStatus,
	) -> Result<Option<JobRecord>, StoreError> {
		let row = sqlx::query_as::<_, JobRow>(&format!(
			r#"
			UPDATE jobs SET status = ?, last_updated = ?, version = version + 1
			WHERE id = ? AND status = ?
			RETURNING {COLUMNS}
			"#
		))
		.bind(to.as_str())
		.bind(format_ts(&Utc::now()))
		.bind(id)
		.bind(from.as_str())
		.fetch_optional(&self.pool)
		.await
		.map_err(backend)?;

		row.map(JobRecord::try_from).transpose()
	}

	#[instrument(skip(self))]
	async fn delete(&self, id: &str) -> Result<bool, StoreError> {
		let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await
			.map_err(backend)?;
		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self))]
	async fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, StoreError> {
		if matches!(&filter.statuses, Some(statuses) if statuses.is_empty()) {
			return Ok(Vec::new());
		}

		let mut query: QueryBuilder<Sqlite> =
			QueryBuilder::new(format!("SELECT {COLUMNS} FROM jobs WHERE 1 = 1"));

		if let Some(statuses) = &filter.statuses {
			query.push(" AND status IN (");
			let mut separated = query.separated(", ");
			for status in statuses {
				separated.push_bind(status.as_str());
			}
			separated.push_unseparated(")");
		}
		if let Some(delegate) = filter.delegate {
			query.push(" AND delegate = ").push_bind(delegate);
		}
		if let Some(cutoff) = &filter.updated_before {
			query
				.push(" AND last_updated < ")
				.push_bind(format_ts(cutoff));
		}
		query.push(" ORDER BY last_updated, id");

		let rows = query
			.build_query_as::<JobRow>()
			.fetch_all(&self.pool)
			.await
			.map_err(backend)?;

		rows.into_iter().map(JobRecord::try_from).collect()
	}
}
