// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Creates a new HTTP client builder with the standard jobd User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = jobd_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a custom timeout and the standard User-Agent.
///
/// Falls back to a default client if the TLS backend cannot be initialised
/// with the requested settings.
pub fn new_client_with_timeout(timeout: Duration) -> Client {
	match builder().timeout(timeout).build() {
		Ok(client) => client,
		Err(e) => {
			tracing::warn!(error = %e, "failed to build HTTP client with timeout, using defaults");
			Client::new()
		}
	}
}

/// Returns the standard jobd User-Agent string.
///
/// Format: `jobd/{version}`
pub fn user_agent() -> String {
	format!("jobd/{}", env!("CARGO_PKG_VERSION"))
}
