//! Database access layer for aqmon-dash
//!
//! The measurement store is populated by an external ingestion pipeline;
//! this service opens it strictly read-only and issues the four
//! window-bounded aggregate queries the dashboard needs.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

pub mod queries;

/// Connect to the measurement database in read-only mode
///
/// Safety: uses SQLite mode=ro so the dashboard can never mutate readings
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        anyhow::bail!(
            "Measurement database not found: {}\nThe ingestion pipeline must create and populate it first.",
            db_path.display()
        );
    }

    // mode=ro: read-only mode
    // immutable=1: additional safety (SQLite won't write even for internal operations)
    let db_url = format!("sqlite://{}?mode=ro&immutable=1", db_path.display());

    let pool = SqlitePool::connect(&db_url)
        .await
        .context("Failed to connect to measurement database in read-only mode")?;

    // Verify read-only by attempting a write (should fail)
    #[cfg(debug_assertions)]
    {
        let write_test = sqlx::query("CREATE TABLE _test_write (id INTEGER)")
            .execute(&pool)
            .await;
        if write_test.is_ok() {
            panic!("SAFETY VIOLATION: Database connection is not read-only!");
        }
    }

    Ok(pool)
}
