// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use jobd_scheduler::{Sweep, SweepContext, SweepError, SweepOutput};
use tracing::instrument;

use super::{report_output, store_failure};
use crate::dispatcher::Dispatcher;

pub struct DispatchSweep {
	dispatcher: Arc<Dispatcher>,
}

impl DispatchSweep {
	pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
		Self { dispatcher }
	}
}

#[async_trait]
impl Sweep for DispatchSweep {
	fn id(&self) -> &str {
		"dispatch-queued"
	}

	fn name(&self) -> &str {
		"Dispatch Queued Jobs"
	}

	fn description(&self) -> &str {
		"Claim queued jobs and start processing them"
	}

	#[instrument(skip(self, ctx), fields(sweep_id = "dispatch-queued"))]
	async fn run(&self, ctx: &SweepContext) -> Result<SweepOutput, SweepError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(SweepError::Cancelled);
		}

		let report = self
			.dispatcher
			.dispatch_queued()
			.await
			.map_err(store_failure)?;

		Ok(report_output(
			format!("launched {} of {} queued jobs", report.processed, report.found),
			report,
		))
	}
}
