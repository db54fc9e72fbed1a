// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP routes exercised through the router without a listener.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jobd_core::{JobStatus, JobStore, MemoryJobStore};
use jobd_server::{create_router, AppState, JobService};
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> (Router, Arc<MemoryJobStore>) {
	let store = Arc::new(MemoryJobStore::new());
	let service = Arc::new(JobService::new(store.clone(), "/var/lib/jobd"));
	(create_router(AppState::new(service)), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let bytes = response.into_body().collect().await.unwrap().to_bytes();
	let body = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).unwrap()
	};
	(status, body)
}

fn upload(body: &str) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/api/upload")
		.header("content-type", "application/json")
		.body(Body::from(body.to_string()))
		.unwrap()
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn set_status(store: &MemoryJobStore, id: &str, status: JobStatus, output: Option<&str>) {
	let mut record = store.get(id).await.unwrap().unwrap();
	record.status = status;
	record.output_payload = output.map(str::to_string);
	store.write(&record).await.unwrap();
}

#[tokio::test]
async fn upload_creates_queued_job_without_leaking_input() {
	let (app, store) = setup();

	let (status, body) = send(&app, upload(r#"{"id":"job1","input":"UEsFBgAAAAAAAAAAAAAAAAAAAAAAAA=="}"#)).await;

	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(body["id"], "job1");
	assert_eq!(body["status"], "QUEUED");
	assert_eq!(body["delegate"], false);
	assert!(body.get("input_payload").is_none());
	assert!(body.get("working_path").is_none());
	assert!(store.get("job1").await.unwrap().is_some());
}

#[tokio::test]
async fn legacy_delegate_field_is_accepted() {
	let (app, _) = setup();

	let (status, body) = send(&app, upload(r#"{"id":"job1","input":"","slurml":true}"#)).await;

	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(body["delegate"], true);
}

#[tokio::test]
async fn duplicate_upload_is_conflict() {
	let (app, store) = setup();
	send(&app, upload(r#"{"id":"job1","input":"first"}"#)).await;

	let (status, body) = send(&app, upload(r#"{"id":"job1","input":"second"}"#)).await;

	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(body["error"], "conflict");
	assert_eq!(store.get("job1").await.unwrap().unwrap().input_payload, "first");
}

#[tokio::test]
async fn missing_or_unsafe_id_is_rejected() {
	let (app, store) = setup();

	for body in [r#"{"input":"abc"}"#, r#"{"id":"../etc","input":"abc"}"#] {
		let (status, response) = send(&app, upload(body)).await;
		assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
		assert_eq!(response["error"], "validation_error");
	}
	assert!(store.is_empty().await);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
	let (app, _) = setup();

	let (status, body) = send(&app, upload("{not json")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn get_reports_readiness() {
	let (app, store) = setup();
	send(&app, upload(r#"{"id":"job1","input":"abc"}"#)).await;

	let (status, body) = send(&app, get("/api/get/job1")).await;
	assert_eq!(status, StatusCode::ACCEPTED);
	assert_eq!(body["error"], "not_ready");

	set_status(&store, "job1", JobStatus::Partial, Some("abc")).await;
	let (status, body) = send(&app, get("/api/get/job1")).await;
	assert_eq!(status, StatusCode::PARTIAL_CONTENT);
	assert_eq!(body["output_payload"], "abc");

	set_status(&store, "job1", JobStatus::Success, Some("xyz")).await;
	let (status, body) = send(&app, get("/api/get/job1")).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "SUCCESS");
	assert_eq!(body["output_payload"], "xyz");
	assert!(body.get("input_payload").is_none());
}

#[tokio::test]
async fn get_unknown_job_is_not_found() {
	let (app, _) = setup();

	let (status, body) = send(&app, get("/api/get/missing")).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body, json!({"error": "not_found", "message": "job not found: missing"}));
}

#[tokio::test]
async fn health_without_scheduler_is_healthy() {
	let (app, _) = setup();

	let (status, body) = send(&app, get("/health")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["status"], "healthy");
	assert!(body.get("sweeps").is_none());
}
