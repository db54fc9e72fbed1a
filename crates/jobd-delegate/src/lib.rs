// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client for the remote batch service.
//!
//! ```text
//! POST  {BASE}/api/submit             {"payload": "<base64>"}  -> 201 {"jobid": <int>}
//! GET   {BASE}/api/download/{jobid}   -> 204 | 206 {"output"} | 200 {"output"} | 500
//! ```
//!
//! Both calls send the configured token verbatim in `Authorization`.

mod client;
mod error;
mod types;

pub use client::DelegateClient;
pub use error::{DelegationError, Result};
pub use types::{OutputResponse, PollOutcome, SubmitRequest, SubmitResponse};
