// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod delegate;
mod execution;
mod http;
mod logging;
mod paths;
mod sweeps;

pub use delegate::{DelegateConfig, DelegateConfigLayer};
pub use execution::{ExecutionConfig, ExecutionConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use paths::{PathsConfig, PathsConfigLayer};
pub use sweeps::{SweepsConfig, SweepsConfigLayer};
