// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use jobd_common_http::RetryableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DelegationError {
	/// Endpoint or token missing. Raised before any network I/O.
	#[error("delegate not configured: {0}")]
	Configuration(String),

	#[error("request to delegate failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("delegate rejected the request ({status}): {body}")]
	Rejected { status: u16, body: String },

	#[error("invalid response from delegate: {0}")]
	InvalidResponse(String),
}

impl RetryableError for DelegationError {
	fn is_retryable(&self) -> bool {
		match self {
			DelegationError::Request(e) => e.is_retryable(),
			DelegationError::Rejected { status, .. } => {
				matches!(*status, 408 | 429 | 500 | 502 | 503 | 504)
			}
			DelegationError::Configuration(_) | DelegationError::InvalidResponse(_) => false,
		}
	}
}

pub type Result<T> = std::result::Result<T, DelegationError>;
