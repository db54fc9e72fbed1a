// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle engine tests against real scripts and a mocked remote service.

#![cfg(unix)]

use std::sync::Arc;

use jobd_config::{DelegateConfig, SecretString};
use jobd_core::{JobRecord, JobStatus, JobStore, JobSubmission, MemoryJobStore};
use jobd_delegate::DelegateClient;
use jobd_packager::{Packager, PackagingError};
use jobd_server::{LifecycleEngine, LifecycleError, LocalExecutor, MSG_SUCCESS};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "secret-token";

fn payload(files: &[(&str, &str)]) -> String {
	let src = tempfile::tempdir().unwrap();
	for (name, content) in files {
		std::fs::write(src.path().join(name), content).unwrap();
	}
	Packager::default().pack(src.path()).unwrap()
}

fn script_payload(body: &str) -> String {
	payload(&[("run.sh", &format!("#!/bin/sh\n{body}\n"))])
}

fn remote(server: &MockServer) -> DelegateConfig {
	DelegateConfig {
		endpoint: Some(server.uri()),
		token: Some(SecretString::new(TOKEN)),
		request_timeout_secs: 5,
		submit_attempts: 1,
	}
}

struct Harness {
	store: Arc<MemoryJobStore>,
	engine: LifecycleEngine,
	base: TempDir,
}

impl Harness {
	fn new(delegate: &DelegateConfig) -> Self {
		let store = Arc::new(MemoryJobStore::new());
		let engine = LifecycleEngine::new(
			store.clone(),
			Packager::default(),
			LocalExecutor::default(),
			DelegateClient::new(delegate),
		);
		Self {
			store,
			engine,
			base: tempfile::tempdir().unwrap(),
		}
	}

	fn keep_workdir(mut self) -> Self {
		self.engine = self.engine.keep_workdir(true);
		self
	}

	async fn queue(&self, id: &str, input: String, delegate: bool) -> JobRecord {
		let record = JobRecord::new(
			JobSubmission {
				id: id.to_string(),
				input,
				delegate,
			},
			self.base.path(),
		);
		self.store.save(&record).await.unwrap();
		record
	}

	async fn stored(&self, id: &str) -> JobRecord {
		self.store.get(id).await.unwrap().unwrap()
	}
}

fn unpack_output(output: &str) -> TempDir {
	let dir = tempfile::tempdir().unwrap();
	jobd_packager::unpack_bytes(&jobd_packager::decode(output).unwrap(), dir.path()).unwrap();
	dir
}

#[tokio::test]
async fn local_success_captures_working_directory() {
	let h = Harness::new(&DelegateConfig::default());
	let job = h
		.queue("job1", script_payload("echo ok > result.txt"), false)
		.await;
	let working_path = job.working_path.clone();

	let done = h.engine.execute(job, &CancellationToken::new()).await.unwrap();

	assert_eq!(done.status, JobStatus::Success);
	assert_eq!(done.message, MSG_SUCCESS);
	assert_eq!(h.stored("job1").await, done);
	assert!(!working_path.exists(), "working directory should be removed");

	let output = unpack_output(done.output_payload.as_deref().unwrap());
	let result = std::fs::read_to_string(output.path().join("result.txt")).unwrap();
	assert_eq!(result.trim(), "ok");
	assert!(output.path().join("run.sh").exists());
}

#[tokio::test]
async fn local_failure_still_captures_output() {
	let h = Harness::new(&DelegateConfig::default());
	let job = h
		.queue("job1", script_payload("echo partial > log.txt\nexit 2"), false)
		.await;

	let done = h.engine.execute(job, &CancellationToken::new()).await.unwrap();

	assert_eq!(done.status, JobStatus::Failed);
	assert!(
		done.message.starts_with("could not finish the job, error: exit status 2"),
		"unexpected message: {}",
		done.message
	);
	let output = unpack_output(done.output_payload.as_deref().unwrap());
	assert!(output.path().join("log.txt").exists());
}

#[tokio::test]
async fn keep_workdir_leaves_directory_in_place() {
	let h = Harness::new(&DelegateConfig::default()).keep_workdir();
	let job = h.queue("job1", script_payload("true"), false).await;
	let working_path = job.working_path.clone();

	let done = h.engine.execute(job, &CancellationToken::new()).await.unwrap();

	assert_eq!(done.status, JobStatus::Success);
	assert!(working_path.join("run.sh").exists());
}

#[tokio::test]
async fn missing_launcher_fails_and_keeps_workdir() {
	let h = Harness::new(&DelegateConfig::default());
	let job = h
		.queue("job1", payload(&[("other.sh", "echo hi")]), false)
		.await;
	let working_path = job.working_path.clone();

	let err = h.engine.prepare(job).await.unwrap_err();

	assert!(matches!(
		err,
		LifecycleError::Packaging(PackagingError::MissingLauncher(_))
	));
	let stored = h.stored("job1").await;
	assert_eq!(stored.status, JobStatus::Failed);
	assert_eq!(stored.message, "run.sh does not exist in the input file");
	assert!(working_path.exists());
	assert!(working_path.join("other.sh").exists());
}

#[tokio::test]
async fn undecodable_input_fails_with_diagnostic() {
	let h = Harness::new(&DelegateConfig::default());
	let job = h.queue("job1", "not base64 at all!".to_string(), false).await;

	let err = h
		.engine
		.execute(job, &CancellationToken::new())
		.await
		.unwrap_err();

	assert!(matches!(err, LifecycleError::Packaging(_)));
	let stored = h.stored("job1").await;
	assert_eq!(stored.status, JobStatus::Failed);
	assert!(stored
		.message
		.starts_with("could not unzip file, is it base64 encoded?"));
	assert!(stored.output_payload.is_none());
}

#[tokio::test]
async fn cancelled_run_is_recorded_as_failed() {
	let h = Harness::new(&DelegateConfig::default());
	let job = h.queue("job1", script_payload("sleep 30"), false).await;
	let cancel = CancellationToken::new();
	cancel.cancel();

	let done = h.engine.execute(job, &cancel).await.unwrap();

	assert_eq!(done.status, JobStatus::Failed);
	assert!(done.message.contains("cancelled"), "{}", done.message);
	assert!(done.output_payload.is_some());
}

#[tokio::test]
async fn reaped_record_stops_the_unit() {
	let h = Harness::new(&DelegateConfig::default());
	let job = h.queue("job1", script_payload("true"), false).await;
	let working_path = job.working_path.clone();
	h.store.delete("job1").await.unwrap();

	let err = h.engine.prepare(job).await.unwrap_err();

	assert!(matches!(err, LifecycleError::Reaped(id) if id == "job1"));
	assert!(h.store.is_empty().await);
	assert!(!working_path.exists(), "unpacked directory of a reaped job should be removed");
}

#[tokio::test]
async fn reaped_record_removes_workdir_even_when_kept() {
	let h = Harness::new(&DelegateConfig::default()).keep_workdir();
	let job = h
		.queue("job1", script_payload("echo hi > out.txt"), false)
		.await;
	let working_path = job.working_path.clone();
	h.store.delete("job1").await.unwrap();

	let err = h
		.engine
		.execute(job, &CancellationToken::new())
		.await
		.unwrap_err();

	assert!(matches!(err, LifecycleError::Reaped(_)));
	assert!(!working_path.exists());
}

#[tokio::test]
async fn delegated_job_without_remote_config_fails_at_submission() {
	let h = Harness::new(&DelegateConfig::default());
	let job = h.queue("job2", script_payload("true"), true).await;
	let working_path = job.working_path.clone();

	let done = h.engine.execute(job, &CancellationToken::new()).await.unwrap();

	assert_eq!(done.status, JobStatus::Failed);
	assert!(
		done.message.starts_with("could not submit the job, error:"),
		"{}",
		done.message
	);
	assert!(done.remote_id.is_none());
	assert!(!working_path.exists());
}

#[tokio::test]
async fn delegated_job_runs_through_partial_to_success() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/api/submit"))
		.and(header("authorization", TOKEN))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({"jobid": 42})))
		.expect(1)
		.mount(&server)
		.await;

	let h = Harness::new(&remote(&server));
	let job = h.queue("job3", script_payload("true"), true).await;

	let running = h.engine.execute(job, &CancellationToken::new()).await.unwrap();
	assert_eq!(running.status, JobStatus::Running);
	assert_eq!(running.remote_id, Some(42));
	assert!(running.output_payload.is_none());

	Mock::given(method("GET"))
		.and(path("/api/download/42"))
		.respond_with(ResponseTemplate::new(206).set_body_json(json!({"output": "abc"})))
		.mount(&server)
		.await;
	let partial = h.engine.refresh_delegated(running).await.unwrap();
	assert_eq!(partial.status, JobStatus::Partial);
	assert_eq!(partial.output_payload.as_deref(), Some("abc"));

	server.reset().await;
	Mock::given(method("GET"))
		.and(path("/api/download/42"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "xyz"})))
		.mount(&server)
		.await;
	let done = h.engine.refresh_delegated(partial).await.unwrap();
	assert_eq!(done.status, JobStatus::Success);
	assert_eq!(done.output_payload.as_deref(), Some("xyz"));
	assert_eq!(h.stored("job3").await, done);
}

#[tokio::test]
async fn not_ready_poll_leaves_record_untouched() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/api/download/7"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	let h = Harness::new(&remote(&server));
	let mut job = h.queue("job4", String::new(), true).await;
	job.status = JobStatus::Running;
	job.remote_id = Some(7);
	h.store.write(&job).await.unwrap();

	let after = h.engine.refresh_delegated(job.clone()).await.unwrap();

	assert_eq!(after, job);
	assert_eq!(h.stored("job4").await, job);
}

#[tokio::test]
async fn remote_failure_fails_the_job() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/api/download/9"))
		.respond_with(ResponseTemplate::new(500))
		.mount(&server)
		.await;

	let h = Harness::new(&remote(&server));
	let mut job = h.queue("job5", String::new(), true).await;
	job.status = JobStatus::Running;
	job.remote_id = Some(9);
	h.store.write(&job).await.unwrap();

	let done = h.engine.refresh_delegated(job).await.unwrap();

	assert_eq!(done.status, JobStatus::Failed);
	assert!(!done.message.is_empty());
}

#[tokio::test]
async fn refresh_requires_running_or_partial() {
	let h = Harness::new(&DelegateConfig::default());
	let job = h.queue("job6", String::new(), true).await;

	let err = h.engine.refresh_delegated(job).await.unwrap_err();

	assert!(matches!(
		err,
		LifecycleError::InvalidState {
			from: JobStatus::Queued,
			..
		}
	));
}

#[tokio::test]
async fn delegated_job_without_remote_id_is_failed() {
	let h = Harness::new(&DelegateConfig::default());
	let mut job = h.queue("job7", String::new(), true).await;
	job.status = JobStatus::Running;
	h.store.write(&job).await.unwrap();

	let done = h.engine.refresh_delegated(job).await.unwrap();

	assert_eq!(done.status, JobStatus::Failed);
	assert_eq!(done.message, "delegated job has no remote id");
}
