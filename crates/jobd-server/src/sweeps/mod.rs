// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! [`Sweep`](jobd_scheduler::Sweep) implementations driving the dispatcher.

mod dispatch;
mod poll;
mod reap;

pub use dispatch::DispatchSweep;
pub use poll::PollSweep;
pub use reap::ReapSweep;

use jobd_core::StoreError;
use jobd_scheduler::{SweepError, SweepOutput};

use crate::dispatcher::SweepReport;

fn store_failure(e: StoreError) -> SweepError {
	SweepError::retryable(e.to_string())
}

fn report_output(message: String, report: SweepReport) -> SweepOutput {
	SweepOutput::new(message).with_metadata(serde_json::json!({
		"found": report.found,
		"processed": report.processed,
		"skipped": report.skipped,
		"failed": report.failed,
	}))
}
