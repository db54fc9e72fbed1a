// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for jobd.

pub mod error;
pub mod job;
pub mod pool;
pub mod schema;
pub mod testing;

pub use error::{DbError, Result};
pub use job::SqliteJobStore;
pub use pool::create_pool;
pub use schema::migrate;
