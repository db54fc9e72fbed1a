// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::DaemonConfigLayer;
use crate::secret::load_secret_env;
use crate::sections::{
	DelegateConfigLayer, ExecutionConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer,
	PathsConfigLayer, SweepsConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<DaemonConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<DaemonConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(DaemonConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/jobd/jobd.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<DaemonConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(DaemonConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: DaemonConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: JOBD_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<DaemonConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(DaemonConfigLayer {
			http: Some(load_http_from_env()?),
			paths: Some(load_paths_from_env()),
			execution: Some(load_execution_from_env()?),
			delegate: Some(load_delegate_from_env()?),
			sweeps: Some(load_sweeps_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("JOBD_HOST"),
		port: env_parse("JOBD_PORT", "u16")?,
	})
}

fn load_paths_from_env() -> PathsConfigLayer {
	PathsConfigLayer {
		data_dir: env_var("JOBD_DATA_PATH").map(PathBuf::from),
		database_url: env_var("JOBD_DATABASE_URL"),
	}
}

fn load_execution_from_env() -> Result<ExecutionConfigLayer, ConfigError> {
	Ok(ExecutionConfigLayer {
		launcher: env_var("JOBD_LAUNCHER"),
		timeout_secs: env_parse("JOBD_EXEC_TIMEOUT_SECS", "u64")?,
		keep_workdir: env_bool("JOBD_KEEP_WORKDIR"),
	})
}

fn load_delegate_from_env() -> Result<DelegateConfigLayer, ConfigError> {
	Ok(DelegateConfigLayer {
		endpoint: env_var("JOBD_DELEGATE_URL"),
		token: load_secret_env("JOBD_DELEGATE_TOKEN")?,
		request_timeout_secs: env_parse("JOBD_DELEGATE_TIMEOUT_SECS", "u64")?,
		submit_attempts: env_parse("JOBD_DELEGATE_SUBMIT_ATTEMPTS", "u32")?,
	})
}

fn load_sweeps_from_env() -> Result<SweepsConfigLayer, ConfigError> {
	Ok(SweepsConfigLayer {
		dispatch_interval_secs: env_parse("JOBD_DISPATCH_INTERVAL_SECS", "u64")?,
		poll_interval_secs: env_parse("JOBD_POLL_INTERVAL_SECS", "u64")?,
		reap_interval_secs: env_parse("JOBD_REAP_INTERVAL_SECS", "u64")?,
		retention_hours: env_parse("JOBD_RETENTION_HOURS", "u64")?,
		max_concurrent_jobs: env_parse("JOBD_MAX_CONCURRENT_JOBS", "usize")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("JOBD_LOG_FORMAT") {
		Some(v) => Some(v.parse::<LogFormat>().map_err(|message| ConfigError::InvalidValue {
			key: "JOBD_LOG_FORMAT".to_string(),
			message,
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("JOBD_LOG_LEVEL"),
		format,
	})
}
