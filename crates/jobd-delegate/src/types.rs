// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
	pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
	pub jobid: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputResponse {
	pub output: String,
}

/// Result of polling a delegated job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
	/// 204: nothing yet.
	NotReady,
	/// 206: intermediate output.
	Partial(String),
	/// 200: final output.
	Complete(String),
	/// Remote failure, unexpected status, transport error or bad body.
	Failed(String),
}

impl PollOutcome {
	pub fn is_terminal(&self) -> bool {
		matches!(self, PollOutcome::Complete(_) | PollOutcome::Failed(_))
	}
}
