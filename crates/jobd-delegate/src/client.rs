// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use jobd_common_http::{new_client_with_timeout, retry, RetryConfig};
use jobd_config::{DelegateConfig, SecretString};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::{DelegationError, Result};
use crate::types::{OutputResponse, PollOutcome, SubmitRequest, SubmitResponse};

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct DelegateClient {
	http: Client,
	endpoint: Option<String>,
	token: Option<SecretString>,
	retry: RetryConfig,
}

impl std::fmt::Debug for DelegateClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DelegateClient")
			.field("endpoint", &self.endpoint)
			.field("token", &self.token)
			.field("submit_attempts", &self.retry.max_attempts)
			.finish()
	}
}

impl DelegateClient {
	pub fn new(config: &DelegateConfig) -> Self {
		let retry = RetryConfig {
			max_attempts: config.submit_attempts.max(1),
			..RetryConfig::default()
		};
		Self {
			http: new_client_with_timeout(config.request_timeout()),
			endpoint: config.endpoint.clone(),
			token: config.token.clone(),
			retry,
		}
	}

	/// Replace the submission backoff policy.
	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;
		self
	}

	pub fn is_configured(&self) -> bool {
		self.endpoint.is_some() && self.token.is_some()
	}

	fn credentials(&self) -> Result<(&str, &str)> {
		let endpoint = self
			.endpoint
			.as_deref()
			.ok_or_else(|| DelegationError::Configuration("remote endpoint is not set".into()))?;
		let token = self
			.token
			.as_ref()
			.ok_or_else(|| DelegationError::Configuration("remote token is not set".into()))?;
		Ok((endpoint, token.expose()))
	}

	/// Submit a base64 payload; returns the remote job id.
	///
	/// With the default single attempt any failure is final. With more
	/// attempts, transport errors and 408/429/5xx responses are retried.
	#[instrument(skip(self, payload), fields(payload_len = payload.len()))]
	pub async fn submit(&self, payload: &str) -> Result<i64> {
		let (endpoint, token) = self.credentials()?;
		let url = format!("{endpoint}/api/submit");
		let body = SubmitRequest {
			payload: payload.to_string(),
		};

		let remote_id = retry(&self.retry, || self.submit_once(&url, token, &body)).await?;
		debug!(remote_id, "delegate accepted job");
		Ok(remote_id)
	}

	async fn submit_once(&self, url: &str, token: &str, body: &SubmitRequest) -> Result<i64> {
		let response = self
			.http
			.post(url)
			.header(AUTHORIZATION, token)
			.json(body)
			.send()
			.await?;

		let status = response.status();
		if status != StatusCode::CREATED {
			let text = response.text().await.unwrap_or_default();
			return Err(DelegationError::Rejected {
				status: status.as_u16(),
				body: truncate(text),
			});
		}

		let accepted: SubmitResponse = response
			.json()
			.await
			.map_err(|e| DelegationError::InvalidResponse(e.to_string()))?;
		Ok(accepted.jobid)
	}

	/// Ask the delegate for a job's output.
	///
	/// Only a missing configuration is an `Err`; everything the remote side
	/// says, including transport failures, maps to a [`PollOutcome`].
	#[instrument(skip(self))]
	pub async fn poll(&self, remote_id: i64) -> Result<PollOutcome> {
		let (endpoint, token) = self.credentials()?;
		let url = format!("{endpoint}/api/download/{remote_id}");

		let response = match self.http.get(&url).header(AUTHORIZATION, token).send().await {
			Ok(response) => response,
			Err(e) => {
				warn!(error = %e, "poll request failed");
				return Ok(PollOutcome::Failed(format!("could not reach delegate: {e}")));
			}
		};

		let status = response.status();
		let outcome = match status {
			StatusCode::NO_CONTENT => PollOutcome::NotReady,
			StatusCode::PARTIAL_CONTENT => match response.json::<OutputResponse>().await {
				Ok(body) => PollOutcome::Partial(body.output),
				Err(e) => PollOutcome::Failed(format!("invalid partial output: {e}")),
			},
			StatusCode::OK => match response.json::<OutputResponse>().await {
				Ok(body) => PollOutcome::Complete(body.output),
				Err(e) => PollOutcome::Failed(format!("invalid output: {e}")),
			},
			StatusCode::INTERNAL_SERVER_ERROR => {
				let text = response.text().await.unwrap_or_default();
				PollOutcome::Failed(format!("delegate reported failure: {}", truncate(text)))
			}
			other => PollOutcome::Failed(format!("unexpected status from delegate: {other}")),
		};

		debug!(status = status.as_u16(), terminal = outcome.is_terminal(), "polled delegate");
		Ok(outcome)
	}
}

fn truncate(mut text: String) -> String {
	if text.len() > MAX_ERROR_BODY {
		let mut cut = MAX_ERROR_BODY;
		while !text.is_char_boundary(cut) {
			cut -= 1;
		}
		text.truncate(cut);
	}
	text
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncate_respects_char_boundaries() {
		let long = "é".repeat(MAX_ERROR_BODY);
		let cut = truncate(long);
		assert!(cut.len() <= MAX_ERROR_BODY);
		assert!(cut.chars().all(|c| c == 'é'));
	}

	#[test]
	fn debug_hides_token() {
		let config = DelegateConfig {
			endpoint: Some("http://localhost:1".into()),
			token: Some(SecretString::new("hunter2")),
			..Default::default()
		};
		let client = DelegateClient::new(&config);
		assert!(client.is_configured());
		assert!(!format!("{client:?}").contains("hunter2"));
	}

	#[tokio::test]
	async fn missing_token_is_configuration_error() {
		let config = DelegateConfig {
			endpoint: Some("http://localhost:1".into()),
			..Default::default()
		};
		let client = DelegateClient::new(&config);
		assert!(matches!(
			client.submit("cGF5").await,
			Err(DelegationError::Configuration(_))
		));
		assert!(matches!(
			client.poll(1).await,
			Err(DelegationError::Configuration(_))
		));
	}
}
