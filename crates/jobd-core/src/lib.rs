// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for jobd.
//!
//! A [`JobRecord`] is the persisted unit of work. Its [`JobStatus`] only moves
//! forward along the graph encoded by [`JobStatus::can_transition_to`]. The
//! [`JobStore`] trait is the persistence contract shared by the in-memory
//! store here and the SQLite store in `jobd-db`.

pub mod error;
pub mod record;
pub mod store;

pub use error::{JobError, StoreError};
pub use record::{
	validate_job_id, JobRecord, JobStatus, JobSubmission, JobView, MAX_JOB_ID_LEN,
};
pub use store::{JobFilter, JobStore, MemoryJobStore};
