// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! jobd daemon binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use jobd_config::{DaemonConfig, LogFormat};
use jobd_core::JobStore;
use jobd_db::SqliteJobStore;
use jobd_scheduler::{RunHistory, SweepScheduler};
use jobd_server::{
	create_router, AppState, DispatchSweep, Dispatcher, JobService, LifecycleEngine, PollSweep,
	ReapSweep,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// jobd - run packaged jobs locally or on a remote batch service.
#[derive(Parser, Debug)]
#[command(name = "jobd", about = "Job execution daemon", version)]
struct Args {
	/// Path to a TOML configuration file
	#[arg(long, env = "JOBD_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => jobd_config::load_config_with_file(path),
		None => jobd_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.paths.database_url,
		"starting jobd"
	);

	tokio::fs::create_dir_all(&config.paths.data_dir)
		.await
		.with_context(|| format!("cannot create {}", config.paths.data_dir.display()))?;

	let pool = jobd_db::create_pool(&config.paths.database_url).await?;
	jobd_db::migrate(&pool).await?;
	let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool));

	let engine = Arc::new(LifecycleEngine::from_config(&config, Arc::clone(&store)));
	let dispatcher = Arc::new(Dispatcher::new(engine, config.sweeps.max_concurrent_jobs));

	let recovered = dispatcher.recover_interrupted().await?;
	if recovered.found > 0 {
		tracing::info!(
			recovered = recovered.processed,
			failed = recovered.failed,
			"recovered interrupted jobs"
		);
	}

	let mut scheduler = SweepScheduler::new(Arc::new(RunHistory::default()));
	scheduler.register_periodic(
		Arc::new(DispatchSweep::new(Arc::clone(&dispatcher))),
		config.sweeps.dispatch_interval(),
	);
	scheduler.register_periodic(
		Arc::new(PollSweep::new(Arc::clone(&dispatcher))),
		config.sweeps.poll_interval(),
	);
	scheduler.register_periodic(
		Arc::new(ReapSweep::new(
			Arc::clone(&dispatcher),
			config.sweeps.retention(),
		)),
		config.sweeps.reap_interval(),
	);
	let scheduler = Arc::new(scheduler);
	scheduler.start().await;

	let service = Arc::new(JobService::new(store, config.paths.data_dir.clone()));
	let state = AppState::new(service).with_scheduler(Arc::clone(&scheduler));
	let app = create_router(state);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("cannot bind {addr}"))?;

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("server error")?;

	tracing::info!("shutting down sweep scheduler");
	scheduler.shutdown().await;
	dispatcher.shutdown().await;

	tracing::info!("jobd shutdown complete");
	Ok(())
}

fn init_tracing(config: &DaemonConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());

	match config.logging.format {
		LogFormat::Pretty => tracing_subscriber::registry()
			.with(filter)
			.with(tracing_subscriber::fmt::layer())
			.init(),
		LogFormat::Json => tracing_subscriber::registry()
			.with(filter)
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
	}
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "failed to listen for shutdown signal");
		return;
	}
	tracing::info!("received shutdown signal");
}
