//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Writes that span several tables (recipe plus links) open their own transaction inside the
//! repository. Handlers that need several repository calls to be atomic begin a transaction and
//! build each repository from it:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut repo = Recipes::new(&mut tx);
//! // ... operations ...
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! foodgram::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Connect to PostgreSQL, retrying while the server is not reachable yet.
///
/// Containers usually start the application before the database accepts connections, so a failed
/// attempt is logged and retried after `connect_retry_interval`. `connect_max_attempts = 0` retries
/// forever.
pub async fn connect_with_retry(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool_settings = &config.pool;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .max_connections(pool_settings.max_connections)
            .min_connections(pool_settings.min_connections)
            .acquire_timeout(Duration::from_secs(pool_settings.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(pool_settings.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(pool_settings.max_lifetime_secs))
            .connect(&config.url)
            .await;

        match result {
            Ok(pool) => {
                info!(
                    "Connected to database (attempt {}, pool: {} connections)",
                    attempt,
                    pool.options().get_max_connections()
                );
                return Ok(pool);
            }
            Err(e) if config.connect_max_attempts == 0 || attempt < config.connect_max_attempts => {
                warn!(
                    "Database not available yet (attempt {}): {}. Retrying in {:?}",
                    attempt, e, config.connect_retry_interval
                );
                tokio::time::sleep(config.connect_retry_interval).await;
            }
            Err(e) => {
                return Err(anyhow::anyhow!("Failed to connect to database after {attempt} attempts: {e}"));
            }
        }
    }
}
