// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
	#[error("sweep not found: {0}")]
	NotFound(String),

	#[error("sweep cancelled")]
	Cancelled,

	#[error("sweep failed: {message}")]
	Failed { message: String, retryable: bool },
}

impl SweepError {
	pub fn retryable(message: impl Into<String>) -> Self {
		SweepError::Failed {
			message: message.into(),
			retryable: true,
		}
	}

	pub fn permanent(message: impl Into<String>) -> Self {
		SweepError::Failed {
			message: message.into(),
			retryable: false,
		}
	}
}

pub type Result<T> = std::result::Result<T, SweepError>;
