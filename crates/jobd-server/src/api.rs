// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Router and shared handler state.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use jobd_scheduler::SweepScheduler;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::service::JobService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<JobService>,
	/// Absent in tests that only exercise the job endpoints.
	pub scheduler: Option<Arc<SweepScheduler>>,
}

impl AppState {
	pub fn new(service: Arc<JobService>) -> Self {
		Self {
			service,
			scheduler: None,
		}
	}

	pub fn with_scheduler(mut self, scheduler: Arc<SweepScheduler>) -> Self {
		self.scheduler = Some(scheduler);
		self
	}
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/api/upload", post(routes::jobs::upload_job))
		.route("/api/get/{id}", get(routes::jobs::get_job))
		.route("/health", get(routes::health::health_check))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
