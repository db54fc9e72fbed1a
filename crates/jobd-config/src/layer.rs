// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by each source.

use serde::Deserialize;

use crate::sections::{
	DelegateConfigLayer, ExecutionConfigLayer, HttpConfigLayer, LoggingConfigLayer,
	PathsConfigLayer, SweepsConfigLayer,
};

/// One source's view of the configuration. Unset sections are `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub paths: Option<PathsConfigLayer>,
	#[serde(default)]
	pub execution: Option<ExecutionConfigLayer>,
	#[serde(default)]
	pub delegate: Option<DelegateConfigLayer>,
	#[serde(default)]
	pub sweeps: Option<SweepsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $field:ident) => {
		match (&mut $self.$field, $other.$field) {
			(Some(current), Some(next)) => current.merge(next),
			(None, Some(next)) => $self.$field = Some(next),
			(_, None) => {}
		}
	};
}

impl DaemonConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: DaemonConfigLayer) {
		merge_section!(self, other, http);
		merge_section!(self, other, paths);
		merge_section!(self, other, execution);
		merge_section!(self, other, delegate);
		merge_section!(self, other, sweeps);
		merge_section!(self, other, logging);
	}
}
