// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobd_core::JobError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
	#[error(transparent)]
	Job(#[from] JobError),

	#[error("bad request: {0}")]
	BadRequest(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error: error.into(),
			message: message.into(),
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, code) = match &self {
			ServerError::Job(JobError::Validation(_)) => (StatusCode::BAD_REQUEST, "validation_error"),
			ServerError::Job(JobError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
			ServerError::Job(JobError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
			ServerError::Job(JobError::NotReady(_)) => (StatusCode::ACCEPTED, "not_ready"),
			ServerError::Job(JobError::Store(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
			ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
		};

		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		}

		(status, Json(ErrorResponse::new(code, self.to_string()))).into_response()
	}
}
