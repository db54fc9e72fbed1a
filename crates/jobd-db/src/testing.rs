// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::job::SqliteJobStore;
use crate::schema::migrate;

/// In-memory pool. A single connection, since every `:memory:` connection
/// is its own database.
pub async fn create_test_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.connect(":memory:")
		.await
		.unwrap()
}

pub async fn create_test_store() -> SqliteJobStore {
	let pool = create_test_pool().await;
	migrate(&pool).await.unwrap();
	SqliteJobStore::new(pool)
}
