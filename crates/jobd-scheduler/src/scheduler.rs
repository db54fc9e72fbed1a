// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::context::{CancellationToken, SweepContext};
use crate::error::{Result, SweepError};
use crate::health::{HealthState, LastRunInfo, SweepHealthStatus, SweepsHealthStatus};
use crate::history::RunHistory;
use crate::sweep::Sweep;
use crate::types::{RunStatus, SweepRun, TriggerSource};

const BASE_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const RETRY_FACTOR: f64 = 2.0;
const MAX_RETRIES: u32 = 3;

struct RegisteredSweep {
	sweep: Arc<dyn Sweep>,
	interval: Duration,
	cancellation_token: CancellationToken,
}

pub struct SweepScheduler {
	sweeps: HashMap<String, RegisteredSweep>,
	history: Arc<RunHistory>,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for SweepScheduler {
	fn default() -> Self {
		Self::new(Arc::new(RunHistory::default()))
	}
}

impl SweepScheduler {
	pub fn new(history: Arc<RunHistory>) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			sweeps: HashMap::new(),
			history,
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn register_periodic(&mut self, sweep: Arc<dyn Sweep>, interval: Duration) {
		let id = sweep.id().to_string();
		self.sweeps.insert(
			id,
			RegisteredSweep {
				sweep,
				interval,
				cancellation_token: CancellationToken::new(),
			},
		);
	}

	pub fn history(&self) -> &Arc<RunHistory> {
		&self.history
	}

	/// Spawn one loop per registered sweep. Each loop fires immediately and
	/// then once per interval; ticks missed while a run is in progress are
	/// skipped, so a sweep never overlaps with itself.
	#[instrument(skip(self))]
	pub async fn start(&self) {
		let mut handles = self.handles.lock().await;

		for (sweep_id, registered) in &self.sweeps {
			let sweep = Arc::clone(&registered.sweep);
			let history = Arc::clone(&self.history);
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			let cancellation_token = registered.cancellation_token.clone();
			let period = registered.interval;
			let sweep_id = sweep_id.clone();

			let handle = tokio::spawn(async move {
				let mut ticker = tokio::time::interval(period);
				ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

				loop {
					tokio::select! {
						_ = ticker.tick() => {
							if cancellation_token.is_cancelled() {
								continue;
							}
							let _ = run_sweep_with_retry(
								&sweep,
								&history,
								TriggerSource::Schedule,
								&cancellation_token,
							).await;
						}
						_ = shutdown_rx.recv() => {
							info!(sweep_id = %sweep_id, "Shutting down periodic sweep");
							break;
						}
					}
				}
			});

			handles.push(handle);
		}

		info!(sweep_count = handles.len(), "Sweep scheduler started");
	}

	/// Run a sweep now, outside its schedule. Returns the run id.
	#[instrument(skip(self))]
	pub async fn trigger(&self, sweep_id: &str, triggered_by: TriggerSource) -> Result<String> {
		let registered = self
			.sweeps
			.get(sweep_id)
			.ok_or_else(|| SweepError::NotFound(sweep_id.to_string()))?;

		run_sweep_with_retry(
			&registered.sweep,
			&self.history,
			triggered_by,
			&registered.cancellation_token,
		)
		.await
	}

	/// Stop scheduling a sweep and signal its current run, if any.
	#[instrument(skip(self))]
	pub fn cancel(&self, sweep_id: &str) -> Result<()> {
		let registered = self
			.sweeps
			.get(sweep_id)
			.ok_or_else(|| SweepError::NotFound(sweep_id.to_string()))?;

		registered.cancellation_token.cancel();
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Sweep scheduler shut down");
	}

	pub fn sweep_ids(&self) -> Vec<String> {
		self.sweeps.keys().cloned().collect()
	}

	pub async fn sweep_status(&self, sweep_id: &str) -> Option<SweepHealthStatus> {
		let registered = self.sweeps.get(sweep_id)?;

		let last_run = self.history.last_run(sweep_id).await;
		let last_completed = self.history.last_completed_run(sweep_id).await;
		let consecutive_failures = self.history.count_consecutive_failures(sweep_id).await;
		let status = determine_health_state(last_completed.as_ref(), consecutive_failures);

		Some(SweepHealthStatus {
			sweep_id: sweep_id.to_string(),
			name: registered.sweep.name().to_string(),
			status,
			last_run: last_run.map(|r| LastRunInfo {
				run_id: r.id,
				status: r.status,
				started_at: r.started_at,
				duration_ms: r.duration_ms,
				error: r.error_message,
			}),
			consecutive_failures,
		})
	}

	pub async fn health_status(&self) -> SweepsHealthStatus {
		let mut sweeps = Vec::new();
		let mut worst_state = HealthState::Healthy;

		let mut ids = self.sweep_ids();
		ids.sort();
		for sweep_id in ids {
			if let Some(status) = self.sweep_status(&sweep_id).await {
				if status.status == HealthState::Unhealthy {
					worst_state = HealthState::Unhealthy;
				} else if status.status == HealthState::Degraded && worst_state != HealthState::Unhealthy
				{
					worst_state = HealthState::Degraded;
				}
				sweeps.push(status);
			}
		}

		SweepsHealthStatus {
			status: worst_state,
			sweeps,
		}
	}
}

fn determine_health_state(last_run: Option<&SweepRun>, consecutive_failures: u32) -> HealthState {
	match last_run.map(|r| r.status) {
		None | Some(RunStatus::Succeeded | RunStatus::Running | RunStatus::Cancelled) => {
			HealthState::Healthy
		}
		Some(RunStatus::Failed) => {
			if consecutive_failures >= 3 {
				HealthState::Unhealthy
			} else if consecutive_failures >= 1 {
				HealthState::Degraded
			} else {
				HealthState::Healthy
			}
		}
	}
}

async fn run_sweep_with_retry(
	sweep: &Arc<dyn Sweep>,
	history: &RunHistory,
	triggered_by: TriggerSource,
	cancellation_token: &CancellationToken,
) -> Result<String> {
	let mut retry_count = 0u32;
	let run_id = history.next_run_id(sweep.id());

	history
		.record_run_start(&SweepRun {
			id: run_id.clone(),
			sweep_id: sweep.id().to_string(),
			status: RunStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count,
			triggered_by,
			metadata: None,
		})
		.await;

	loop {
		let ctx = SweepContext {
			run_id: run_id.clone(),
			triggered_by: if retry_count > 0 {
				TriggerSource::Retry
			} else {
				triggered_by
			},
			cancellation_token: cancellation_token.clone(),
		};

		match sweep.run(&ctx).await {
			Ok(output) => {
				history
					.record_run_complete(
						sweep.id(),
						&run_id,
						RunStatus::Succeeded,
						None,
						output.metadata,
						retry_count,
					)
					.await;
				debug!(sweep_id = %sweep.id(), run_id = %run_id, message = %output.message, "Sweep completed");
				return Ok(run_id);
			}
			Err(SweepError::Cancelled) => {
				history
					.record_run_complete(sweep.id(), &run_id, RunStatus::Cancelled, None, None, retry_count)
					.await;
				info!(sweep_id = %sweep.id(), run_id = %run_id, "Sweep cancelled");
				return Err(SweepError::Cancelled);
			}
			Err(SweepError::Failed { message, retryable }) => {
				if retryable && retry_count < MAX_RETRIES && !cancellation_token.is_cancelled() {
					retry_count += 1;
					let delay_secs = calculate_backoff_delay(retry_count);
					warn!(
						sweep_id = %sweep.id(),
						run_id = %run_id,
						retry_count,
						delay_secs,
						error = %message,
						"Sweep failed, retrying"
					);
					tokio::time::sleep(Duration::from_secs(delay_secs)).await;
					continue;
				}

				history
					.record_run_complete(
						sweep.id(),
						&run_id,
						RunStatus::Failed,
						Some(message.clone()),
						None,
						retry_count,
					)
					.await;
				warn!(sweep_id = %sweep.id(), run_id = %run_id, error = %message, "Sweep failed");
				return Err(SweepError::Failed { message, retryable });
			}
			Err(e) => {
				let message = e.to_string();
				history
					.record_run_complete(
						sweep.id(),
						&run_id,
						RunStatus::Failed,
						Some(message.clone()),
						None,
						retry_count,
					)
					.await;
				warn!(sweep_id = %sweep.id(), run_id = %run_id, error = %message, "Sweep failed with error");
				return Err(e);
			}
		}
	}
}

pub(crate) fn calculate_backoff_delay(retry_count: u32) -> u64 {
	let delay = BASE_RETRY_DELAY_SECS as f64 * RETRY_FACTOR.powi(retry_count as i32 - 1);
	(delay as u64).min(MAX_RETRY_DELAY_SECS)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::SweepOutput;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicU32, Ordering};

	struct CountingSweep {
		id: String,
		runs: AtomicU32,
		fail_first: u32,
		retryable: bool,
	}

	impl CountingSweep {
		fn new(id: &str) -> Self {
			Self::failing(id, 0, false)
		}

		fn failing(id: &str, fail_first: u32, retryable: bool) -> Self {
			Self {
				id: id.to_string(),
				runs: AtomicU32::new(0),
				fail_first,
				retryable,
			}
		}

		fn runs(&self) -> u32 {
			self.runs.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl Sweep for CountingSweep {
		fn id(&self) -> &str {
			&self.id
		}

		fn name(&self) -> &str {
			"Counting sweep"
		}

		fn description(&self) -> &str {
			"Counts its runs"
		}

		async fn run(&self, _ctx: &SweepContext) -> std::result::Result<SweepOutput, SweepError> {
			let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
			if n <= self.fail_first {
				return Err(SweepError::Failed {
					message: format!("failure {n}"),
					retryable: self.retryable,
				});
			}
			Ok(SweepOutput::new("ok"))
		}
	}

	fn sample_run(status: RunStatus) -> SweepRun {
		SweepRun {
			id: "run-1".to_string(),
			sweep_id: "sweep-1".to_string(),
			status,
			started_at: Utc::now(),
			completed_at: Some(Utc::now()),
			duration_ms: Some(10),
			error_message: None,
			retry_count: 0,
			triggered_by: TriggerSource::Schedule,
			metadata: None,
		}
	}

	#[test]
	fn test_calculate_backoff_delay() {
		assert_eq!(calculate_backoff_delay(1), 1);
		assert_eq!(calculate_backoff_delay(2), 2);
		assert_eq!(calculate_backoff_delay(3), 4);
		assert_eq!(calculate_backoff_delay(10), MAX_RETRY_DELAY_SECS);
	}

	#[test]
	fn test_determine_health_state() {
		assert_eq!(determine_health_state(None, 0), HealthState::Healthy);
		let ok = sample_run(RunStatus::Succeeded);
		assert_eq!(determine_health_state(Some(&ok), 0), HealthState::Healthy);
		let failed = sample_run(RunStatus::Failed);
		assert_eq!(determine_health_state(Some(&failed), 0), HealthState::Healthy);
		assert_eq!(determine_health_state(Some(&failed), 1), HealthState::Degraded);
		assert_eq!(determine_health_state(Some(&failed), 2), HealthState::Degraded);
		assert_eq!(determine_health_state(Some(&failed), 3), HealthState::Unhealthy);
	}

	#[tokio::test]
	async fn test_trigger_nonexistent_sweep_returns_not_found() {
		let scheduler = SweepScheduler::default();
		match scheduler.trigger("nope", TriggerSource::Manual).await {
			Err(SweepError::NotFound(id)) => assert_eq!(id, "nope"),
			other => panic!("expected NotFound, got {other:?}"),
		}
		assert!(matches!(scheduler.cancel("nope"), Err(SweepError::NotFound(_))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_retryable_failure_is_retried() {
		let sweep = Arc::new(CountingSweep::failing("flaky", 2, true));
		let mut scheduler = SweepScheduler::default();
		scheduler.register_periodic(sweep.clone(), Duration::from_secs(3600));

		scheduler.trigger("flaky", TriggerSource::Manual).await.unwrap();
		assert_eq!(sweep.runs(), 3);

		let status = scheduler.sweep_status("flaky").await.unwrap();
		assert_eq!(status.status, HealthState::Healthy);
		let last = scheduler.history().last_run("flaky").await.unwrap();
		assert_eq!(last.retry_count, 2);
	}

	#[tokio::test]
	async fn test_permanent_failure_is_not_retried() {
		let sweep = Arc::new(CountingSweep::failing("broken", 10, false));
		let mut scheduler = SweepScheduler::default();
		scheduler.register_periodic(sweep.clone(), Duration::from_secs(3600));

		let result = scheduler.trigger("broken", TriggerSource::Manual).await;
		assert!(matches!(result, Err(SweepError::Failed { retryable: false, .. })));
		assert_eq!(sweep.runs(), 1);

		let health = scheduler.health_status().await;
		assert_eq!(health.status, HealthState::Degraded);
	}

	#[tokio::test]
	async fn test_three_failures_make_unhealthy() {
		let sweep = Arc::new(CountingSweep::failing("broken", 10, false));
		let mut scheduler = SweepScheduler::default();
		scheduler.register_periodic(sweep, Duration::from_secs(3600));

		for _ in 0..3 {
			let _ = scheduler.trigger("broken", TriggerSource::Manual).await;
		}
		assert_eq!(scheduler.health_status().await.status, HealthState::Unhealthy);
	}

	#[tokio::test(start_paused = true)]
	async fn test_periodic_loop_runs_until_shutdown() {
		let sweep = Arc::new(CountingSweep::new("tick"));
		let mut scheduler = SweepScheduler::default();
		scheduler.register_periodic(sweep.clone(), Duration::from_secs(10));

		scheduler.start().await;
		tokio::time::sleep(Duration::from_secs(35)).await;
		scheduler.shutdown().await;

		let runs = sweep.runs();
		assert!(runs >= 3, "expected at least 3 runs, got {runs}");
		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(sweep.runs(), runs);
	}

	#[tokio::test(start_paused = true)]
	async fn test_failing_periodic_sweep_reports_failure_while_next_run_is_in_progress() {
		let sweep = Arc::new(CountingSweep::failing("doomed", u32::MAX, true));
		let mut scheduler = SweepScheduler::default();
		scheduler.register_periodic(sweep.clone(), Duration::from_secs(1));

		scheduler.start().await;
		tokio::time::sleep(Duration::from_secs(60)).await;

		let last = scheduler.history().last_run("doomed").await.unwrap();
		assert_eq!(last.status, RunStatus::Running);

		let status = scheduler.sweep_status("doomed").await.unwrap();
		assert!(status.consecutive_failures >= 3);
		assert_eq!(status.status, HealthState::Unhealthy);
		assert_eq!(scheduler.health_status().await.status, HealthState::Unhealthy);

		scheduler.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancelled_sweep_stops_running() {
		let sweep = Arc::new(CountingSweep::new("stoppable"));
		let mut scheduler = SweepScheduler::default();
		scheduler.register_periodic(sweep.clone(), Duration::from_secs(10));

		scheduler.start().await;
		tokio::time::sleep(Duration::from_secs(1)).await;
		scheduler.cancel("stoppable").unwrap();
		let runs = sweep.runs();
		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(sweep.runs(), runs);

		scheduler.shutdown().await;
	}
}
