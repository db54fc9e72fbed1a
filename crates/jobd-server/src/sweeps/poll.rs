// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use jobd_scheduler::{Sweep, SweepContext, SweepError, SweepOutput};
use tracing::instrument;

use super::{report_output, store_failure};
use crate::dispatcher::Dispatcher;

pub struct PollSweep {
	dispatcher: Arc<Dispatcher>,
}

impl PollSweep {
	pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
		Self { dispatcher }
	}
}

#[async_trait]
impl Sweep for PollSweep {
	fn id(&self) -> &str {
		"poll-delegated"
	}

	fn name(&self) -> &str {
		"Poll Delegated Jobs"
	}

	fn description(&self) -> &str {
		"Check the remote service for progress on delegated jobs"
	}

	#[instrument(skip(self, ctx), fields(sweep_id = "poll-delegated"))]
	async fn run(&self, ctx: &SweepContext) -> Result<SweepOutput, SweepError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(SweepError::Cancelled);
		}

		let report = self
			.dispatcher
			.poll_delegated()
			.await
			.map_err(store_failure)?;

		Ok(report_output(
			format!("polling {} delegated jobs", report.processed),
			report,
		))
	}
}
