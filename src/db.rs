use std::future::Future;
use std::time::Duration;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::estimator::ActivityEstimator;

pub type DbPool = SqlitePool;

/// Shared handles passed to every event handler
#[derive(Debug, Clone)]
pub struct AppState {
  pub store: Store,
  pub config: EngineConfig,
  pub estimator: Option<ActivityEstimator>,
}

/// Handle to the document store. Every call made through it is bounded by
/// `timeout` so a stuck database surfaces as `StorageUnavailable`.
#[derive(Debug, Clone)]
pub struct Store {
  pool: DbPool,
  timeout: Duration,
}

impl Store {
  pub fn new(pool: DbPool, timeout: Duration) -> Self {
    Self { pool, timeout }
  }

  pub fn pool(&self) -> &DbPool {
    &self.pool
  }

  /// Run a storage operation under the store timeout
  pub async fn bounded<T, F>(&self, op: &str, fut: F) -> EngineResult<T>
  where
    F: Future<Output = Result<T, sqlx::Error>>,
  {
    match tokio::time::timeout(self.timeout, fut).await {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(e)) => {
        tracing::error!(op, error = %e, "Storage operation failed");
        Err(EngineError::StorageUnavailable(format!("{}: {}", op, e)))
      }
      Err(_) => {
        tracing::error!(op, timeout_ms = self.timeout.as_millis() as u64, "Storage operation timed out");
        Err(EngineError::StorageUnavailable(format!(
          "{}: timed out after {} ms",
          op,
          self.timeout.as_millis()
        )))
      }
    }
  }

  pub async fn close(&self) {
    self.pool.close().await;
  }
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(config: &EngineConfig) -> Result<Store, Box<dyn std::error::Error>> {
  tracing::info!(url = %config.database_url, "Initializing database");

  let pool = SqlitePoolOptions::new()
    .max_connections(config.max_connections)
    .acquire_timeout(config.store_timeout)
    .connect(&config.database_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!("Database initialized successfully");

  Ok(Store::new(pool, config.store_timeout))
}
