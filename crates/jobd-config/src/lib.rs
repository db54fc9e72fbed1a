// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the jobd daemon.
//!
//! Values are layered from built-in defaults, an optional TOML file
//! (`/etc/jobd/jobd.toml` unless overridden) and `JOBD_*` environment
//! variables, in that order of increasing precedence.
//!
//! # Usage
//!
//! ```ignore
//! use jobd_config::load_config;
//!
//! let config = load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod secret;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::DaemonConfigLayer;
pub use secret::{load_secret_env, SecretString, REDACTED};
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved daemon configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaemonConfig {
	pub http: HttpConfig,
	pub paths: PathsConfig,
	pub execution: ExecutionConfig,
	pub delegate: DelegateConfig,
	pub sweeps: SweepsConfig,
	pub logging: LoggingConfig,
}

impl DaemonConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from defaults, the system config file and the
/// environment.
pub fn load_config() -> Result<DaemonConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<DaemonConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<DaemonConfig, ConfigError> {
	let mut merged = DaemonConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<DaemonConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = DaemonConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer into a validated configuration.
pub fn finalize(layer: DaemonConfigLayer) -> Result<DaemonConfig, ConfigError> {
	let config = DaemonConfig {
		http: layer.http.unwrap_or_default().finalize(),
		paths: layer.paths.unwrap_or_default().finalize(),
		execution: layer.execution.unwrap_or_default().finalize(),
		delegate: layer.delegate.unwrap_or_default().finalize(),
		sweeps: layer.sweeps.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		data_dir = %config.paths.data_dir.display(),
		database = %config.paths.database_url,
		launcher = %config.execution.launcher,
		delegate_configured = config.delegate.is_configured(),
		max_concurrent_jobs = config.sweeps.max_concurrent_jobs,
		retention_hours = config.sweeps.retention_hours,
		"daemon configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
pub fn validate_config(config: &DaemonConfig) -> Result<(), ConfigError> {
	let sweeps = &config.sweeps;
	for (name, value) in [
		("sweeps.dispatch_interval_secs", sweeps.dispatch_interval_secs),
		("sweeps.poll_interval_secs", sweeps.poll_interval_secs),
		("sweeps.reap_interval_secs", sweeps.reap_interval_secs),
	] {
		if value == 0 {
			return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
		}
	}

	if sweeps.max_concurrent_jobs == 0 {
		return Err(ConfigError::Validation(
			"sweeps.max_concurrent_jobs must be greater than zero".to_string(),
		));
	}

	if config.delegate.submit_attempts == 0 {
		return Err(ConfigError::Validation(
			"delegate.submit_attempts must be at least 1".to_string(),
		));
	}

	if let Some(endpoint) = &config.delegate.endpoint {
		if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
			return Err(ConfigError::Validation(format!(
				"delegate.endpoint must be an http(s) URL, got '{endpoint}'"
			)));
		}
	}

	let launcher = config.execution.launcher.as_str();
	if launcher.trim().is_empty() || launcher.contains('/') || matches!(launcher, "." | "..") {
		return Err(ConfigError::Validation(
			"execution.launcher must be a plain file name".to_string(),
		));
	}

	Ok(())
}
