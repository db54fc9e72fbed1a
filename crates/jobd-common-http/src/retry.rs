// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Errors that know whether a repeated attempt could succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		match self.status() {
			Some(status) => matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504),
			None => self.is_request(),
		}
	}
}

/// Backoff settings for [`retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first one. `1` disables retrying.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	/// Adds up to 25% random jitter to each delay.
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(30),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// A policy that performs exactly one attempt.
	pub fn no_retry() -> Self {
		Self {
			max_attempts: 1,
			..Default::default()
		}
	}

	/// Delay before retry number `retry` (1-based), without jitter.
	pub fn delay_for(&self, retry: u32) -> Duration {
		let exp = self.backoff_factor.powi(retry.saturating_sub(1) as i32);
		let millis = (self.base_delay.as_millis() as f64 * exp).min(self.max_delay.as_millis() as f64);
		Duration::from_millis(millis as u64)
	}

	fn jittered(&self, delay: Duration) -> Duration {
		if !self.jitter || delay.is_zero() {
			return delay;
		}
		let extra = (delay.as_millis() as f64 * 0.25 * fastrand::f64()) as u64;
		delay + Duration::from_millis(extra)
	}
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. The last error is returned.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
	E: RetryableError + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let max_attempts = config.max_attempts.max(1);
	let mut attempt = 1u32;

	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(e) if attempt < max_attempts && e.is_retryable() => {
				let delay = config.jittered(config.delay_for(attempt));
				warn!(
					attempt,
					max_attempts,
					delay_ms = delay.as_millis() as u64,
					error = %e,
					"request failed, retrying"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(e) => {
				debug!(attempt, error = %e, "giving up");
				return Err(e);
			}
		}
	}
}
