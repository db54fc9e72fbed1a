// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job submission and retrieval handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jobd_core::{JobStatus, JobSubmission};

use crate::api::AppState;
use crate::error::ServerError;

/// POST /api/upload - Queue a new job.
pub async fn upload_job(
	State(state): State<AppState>,
	payload: Result<Json<JobSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, ServerError> {
	let Json(submission) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
	let record = state.service.create_job(submission).await?;
	Ok((StatusCode::CREATED, Json(record.view())))
}

/// GET /api/get/{id} - Fetch a finished or partially finished job.
///
/// PARTIAL jobs are answered with 206 so clients know to come back.
pub async fn get_job(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
	let view = state.service.get_job(&id).await?;
	let status = match view.status {
		JobStatus::Partial => StatusCode::PARTIAL_CONTENT,
		_ => StatusCode::OK,
	};
	Ok((status, Json(view)))
}
