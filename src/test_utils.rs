//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - Helper assertions

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::config::EngineConfig;
use crate::db::{AppState, Store};
use crate::models::{BiologicalSex, ProfileForm, ProfileSnapshot, UserProfile};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations (schema and plan catalog) and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// In-memory store with a generous timeout
pub async fn setup_test_store() -> Store {
  Store::new(setup_test_db().await, Duration::from_secs(5))
}

/// Handler state over a fresh store, default config and no estimator
pub async fn test_state() -> AppState {
  AppState {
    store: setup_test_store().await,
    config: EngineConfig::default(),
    estimator: None,
  }
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Insert a user with the mock profile filled in and an optional kcal target
pub async fn seed_test_user(store: &Store, user_id: &str, kcal_target: Option<i64>) {
  let form = mock_profile_form();
  sqlx::query(
    r#"
    INSERT INTO users (user_id, email, name, age, height, weight, sex, target, kcal_target, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    "#,
  )
  .bind(user_id)
  .bind(format!("{}@example.com", user_id))
  .bind("Test User")
  .bind(form.age)
  .bind(form.height)
  .bind(form.weight)
  .bind(form.sex)
  .bind(&form.target)
  .bind(kcal_target)
  .bind(Utc::now())
  .execute(store.pool())
  .await
  .expect("Failed to seed user");
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// 30 year old male, 70 kg, 175 cm (BMI ~22.9)
pub fn mock_profile() -> UserProfile {
  UserProfile::new(70.0, 175.0, 30, BiologicalSex::Male).expect("mock profile is valid")
}

pub fn mock_profile_form() -> ProfileForm {
  ProfileForm {
    age: 30,
    height: 175.0,
    weight: 70.0,
    sex: true,
    target: "health".to_string(),
  }
}

/// Build a snapshot the way a change event would carry it
pub fn mock_snapshot(fields: serde_json::Value) -> ProfileSnapshot {
  serde_json::from_value(fields).expect("snapshot fields must be a JSON object")
}

/// ---------------------------------------------------------------------------
/// Time Utilities
/// ---------------------------------------------------------------------------

/// Fixed UTC timestamp
pub fn datetime_at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
  Utc
    .with_ymd_and_hms(year, month, day, hour, minute, second)
    .single()
    .expect("valid test timestamp")
}

/// ---------------------------------------------------------------------------
/// Log Capture
/// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.0.lock().expect("log buffer poisoned").extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

/// Run `f` with a thread-local subscriber and return its result plus
/// everything it logged, formatted as plain text
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
  let buffer = LogBuffer::default();
  let writer = buffer.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_writer(move || writer.clone())
    .with_ansi(false)
    .with_max_level(tracing::Level::DEBUG)
    .finish();

  let result = tracing::subscriber::with_default(subscriber, f);
  let logs = String::from_utf8_lossy(&buffer.0.lock().expect("log buffer poisoned")).into_owned();
  (result, logs)
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('users', 'plan_templates', 'day_buckets')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 3, "Expected 3 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_user_fills_profile() {
    let store = setup_test_store().await;
    seed_test_user(&store, "u1", Some(2000)).await;

    let (target, kcal): (String, Option<i64>) =
      sqlx::query_as("SELECT target, kcal_target FROM users WHERE user_id = 'u1'")
        .fetch_one(store.pool())
        .await
        .expect("Failed to read user");

    assert_eq!(target, "health");
    assert_eq!(kcal, Some(2000));

    store.close().await;
  }

  #[test]
  fn test_mock_factories_create_valid_data() {
    let profile = mock_profile();
    assert_eq!(profile.age, 30);
    assert_approx_eq!(profile.bmi(), 22.857, 0.001);

    let snapshot = mock_snapshot(serde_json::json!({ "target": "lose_fat", "kcal_target": 1800 }));
    assert_eq!(snapshot.target(), Some("lose_fat"));
    assert_eq!(snapshot.get("kcal_target"), Some(&serde_json::json!(1800)));
  }

  #[test]
  fn test_capture_logs_collects_output() {
    let (value, logs) = capture_logs(|| {
      tracing::warn!(slot = 3, "Something odd");
      7
    });
    assert_eq!(value, 7);
    assert!(logs.contains("Something odd"));
    assert!(logs.contains("slot=3"));
  }

  #[test]
  fn test_datetime_at() {
    assert_eq!(datetime_at(2025, 6, 2, 9, 0, 0).to_rfc3339(), "2025-06-02T09:00:00+00:00");
  }
}
