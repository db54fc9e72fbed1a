// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use jobd_common_http::RetryConfig;
use jobd_config::{DelegateConfig, SecretString};
use jobd_delegate::{DelegateClient, DelegationError, PollOutcome};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "tok-123";

fn config(server: &MockServer, attempts: u32) -> DelegateConfig {
	DelegateConfig {
		endpoint: Some(server.uri()),
		token: Some(SecretString::new(TOKEN)),
		request_timeout_secs: 5,
		submit_attempts: attempts,
	}
}

fn fast_retry(attempts: u32) -> RetryConfig {
	RetryConfig {
		max_attempts: attempts,
		base_delay: Duration::from_millis(1),
		max_delay: Duration::from_millis(5),
		backoff_factor: 2.0,
		jitter: false,
	}
}

#[tokio::test]
async fn submit_posts_payload_with_raw_token() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/submit"))
		.and(header("authorization", TOKEN))
		.and(body_json(json!({"payload": "cGF5bG9hZA=="})))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({"jobid": 4711})))
		.expect(1)
		.mount(&server)
		.await;

	let client = DelegateClient::new(&config(&server, 1));
	assert_eq!(client.submit("cGF5bG9hZA==").await.unwrap(), 4711);
}

#[tokio::test]
async fn submit_non_201_is_rejected_without_retry_by_default() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/submit"))
		.respond_with(ResponseTemplate::new(503).set_body_string("busy"))
		.expect(1)
		.mount(&server)
		.await;

	let client = DelegateClient::new(&config(&server, 1));
	let err = client.submit("eA==").await.unwrap_err();
	assert!(matches!(err, DelegationError::Rejected { status: 503, ref body } if body == "busy"));
}

#[tokio::test]
async fn submit_200_is_not_acceptance() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/submit"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobid": 1})))
		.mount(&server)
		.await;

	let client = DelegateClient::new(&config(&server, 1));
	assert!(matches!(
		client.submit("eA==").await,
		Err(DelegationError::Rejected { status: 200, .. })
	));
}

#[tokio::test]
async fn submit_malformed_body_is_invalid_response() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/submit"))
		.respond_with(ResponseTemplate::new(201).set_body_string("not json"))
		.mount(&server)
		.await;

	let client = DelegateClient::new(&config(&server, 3)).with_retry(fast_retry(3));
	let err = client.submit("eA==").await.unwrap_err();
	assert!(matches!(err, DelegationError::InvalidResponse(_)));
	assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn submit_retries_transient_failures_when_enabled() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/submit"))
		.respond_with(ResponseTemplate::new(503))
		.up_to_n_times(2)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/submit"))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({"jobid": 9})))
		.mount(&server)
		.await;

	let client = DelegateClient::new(&config(&server, 3)).with_retry(fast_retry(3));
	assert_eq!(client.submit("eA==").await.unwrap(), 9);
	assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn unconfigured_client_makes_no_requests() {
	let server = MockServer::start().await;
	let config = DelegateConfig {
		endpoint: Some(server.uri()),
		token: None,
		..Default::default()
	};

	let client = DelegateClient::new(&config);
	assert!(matches!(
		client.submit("eA==").await,
		Err(DelegationError::Configuration(_))
	));
	assert!(matches!(
		client.poll(7).await,
		Err(DelegationError::Configuration(_))
	));
	assert!(server.received_requests().await.unwrap().is_empty());
}

async fn poll_with(template: ResponseTemplate) -> PollOutcome {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/api/download/42"))
		.and(header("authorization", TOKEN))
		.respond_with(template)
		.mount(&server)
		.await;

	DelegateClient::new(&config(&server, 1)).poll(42).await.unwrap()
}

#[tokio::test]
async fn poll_maps_statuses() {
	assert_eq!(poll_with(ResponseTemplate::new(204)).await, PollOutcome::NotReady);
	assert_eq!(
		poll_with(ResponseTemplate::new(206).set_body_json(json!({"output": "abc"}))).await,
		PollOutcome::Partial("abc".into())
	);
	assert_eq!(
		poll_with(ResponseTemplate::new(200).set_body_json(json!({"output": "xyz"}))).await,
		PollOutcome::Complete("xyz".into())
	);
	assert!(matches!(
		poll_with(ResponseTemplate::new(500)).await,
		PollOutcome::Failed(_)
	));
	assert!(matches!(
		poll_with(ResponseTemplate::new(404)).await,
		PollOutcome::Failed(_)
	));
	assert!(matches!(
		poll_with(ResponseTemplate::new(200).set_body_string("{}")).await,
		PollOutcome::Failed(_)
	));
}

#[tokio::test]
async fn poll_transport_error_is_failed() {
	let server = MockServer::start().await;
	let config = config(&server, 1);
	drop(server);

	let outcome = DelegateClient::new(&config).poll(1).await.unwrap();
	assert!(matches!(outcome, PollOutcome::Failed(_)));
}
