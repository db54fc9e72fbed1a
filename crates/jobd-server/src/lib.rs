// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! jobd: a job daemon that unpacks submitted archives, runs them locally or
//! hands them to a remote batch service, and serves the results over HTTP.

pub mod api;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod executor;
pub mod routes;
pub mod service;
pub mod sweeps;

pub use api::{create_router, AppState};
pub use dispatcher::{Dispatcher, SweepReport, MSG_INTERRUPTED};
pub use engine::{LifecycleEngine, LifecycleError, MSG_SUCCESS};
pub use error::{ErrorResponse, ServerError};
pub use executor::{ExecutionError, ExitOutcome, LocalExecutor};
pub use service::JobService;
pub use sweeps::{DispatchSweep, PollSweep, ReapSweep};
