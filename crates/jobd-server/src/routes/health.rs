// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jobd_scheduler::{HealthState, SweepsHealthStatus};
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthState,
	pub timestamp: String,
	pub version: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sweeps: Option<SweepsHealthStatus>,
}

/// GET /health - Sweep health summary.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let sweeps = match &state.scheduler {
		Some(scheduler) => Some(scheduler.health_status().await),
		None => None,
	};
	let status = sweeps
		.as_ref()
		.map_or(HealthState::Healthy, |sweeps| sweeps.status);

	let response = HealthResponse {
		status,
		timestamp: chrono::Utc::now().to_rfc3339(),
		version: env!("CARGO_PKG_VERSION"),
		sweeps,
	};

	let http_status = match status {
		HealthState::Healthy | HealthState::Degraded => StatusCode::OK,
		HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};

	(http_status, Json(response))
}
