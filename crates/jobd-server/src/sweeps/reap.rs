// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobd_scheduler::{Sweep, SweepContext, SweepError, SweepOutput};
use tracing::instrument;

use super::{report_output, store_failure};
use crate::dispatcher::Dispatcher;

pub struct ReapSweep {
	dispatcher: Arc<Dispatcher>,
	retention: Duration,
}

impl ReapSweep {
	pub fn new(dispatcher: Arc<Dispatcher>, retention: Duration) -> Self {
		Self {
			dispatcher,
			retention,
		}
	}
}

#[async_trait]
impl Sweep for ReapSweep {
	fn id(&self) -> &str {
		"reap-expired"
	}

	fn name(&self) -> &str {
		"Reap Expired Jobs"
	}

	fn description(&self) -> &str {
		"Delete job records past their retention period"
	}

	#[instrument(skip(self, ctx), fields(sweep_id = "reap-expired"))]
	async fn run(&self, ctx: &SweepContext) -> Result<SweepOutput, SweepError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(SweepError::Cancelled);
		}

		let report = self
			.dispatcher
			.reap_expired(self.retention)
			.await
			.map_err(store_failure)?;

		Ok(report_output(
			format!("deleted {} expired jobs", report.processed),
			report,
		))
	}
}
