// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::context::SweepContext;
use crate::error::SweepError;
use crate::types::SweepOutput;

/// A unit of periodic background work.
#[async_trait]
pub trait Sweep: Send + Sync {
	fn id(&self) -> &str;
	fn name(&self) -> &str;
	fn description(&self) -> &str;
	async fn run(&self, ctx: &SweepContext) -> Result<SweepOutput, SweepError>;
}
