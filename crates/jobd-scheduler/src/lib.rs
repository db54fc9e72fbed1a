// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic sweep scheduler for jobd.
//!
//! Sweeps are registered with an interval and run on their own task. Failed
//! runs marked retryable are retried with exponential backoff, and the
//! outcome of every run is kept in a bounded in-memory history that feeds the
//! health report.

pub mod context;
pub mod error;
pub mod health;
pub mod history;
pub mod scheduler;
pub mod sweep;
pub mod types;

pub use context::{CancellationToken, SweepContext};
pub use error::{Result, SweepError};
pub use health::{HealthState, LastRunInfo, SweepHealthStatus, SweepsHealthStatus};
pub use history::RunHistory;
pub use scheduler::SweepScheduler;
pub use sweep::Sweep;
pub use types::{RunStatus, SweepOutput, SweepRun, TriggerSource};
