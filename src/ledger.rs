//! Daily kcal ledger
//!
//! Each user has one bucket per day holding consumed and burnt kcal. Buckets
//! are created lazily and only ever incremented; every increment is a single
//! upsert so concurrent writers cannot lose each other's updates.
//!
//! Day keys are `YYYY-MM-DD` (UTC). Older rows may carry a full
//! `YYYY-MM-DDTHH:MM:SS` timestamp; lookups match on the date prefix and
//! `normalize_legacy_keys` folds those rows into the canonical bucket.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::db::Store;
use crate::error::{EngineError, EngineResult};
use crate::models::{DailyBalance, DayBucket};

const DAY_FORMAT: &str = "%Y-%m-%d";
const LEGACY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// ---------------------------------------------------------------------------
/// Day Keys
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
  pub fn from_timestamp(at: DateTime<Utc>) -> Self {
    Self(at.date_naive())
  }

  /// Accepts both the canonical date and the legacy timestamp form
  pub fn parse(raw: &str) -> Option<Self> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DAY_FORMAT)
      .or_else(|_| NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT).map(|dt| dt.date()))
      .ok()
      .map(Self)
  }

  pub fn is_canonical(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw, DAY_FORMAT).is_ok()
  }
}

impl From<NaiveDate> for DayKey {
  fn from(date: NaiveDate) -> Self {
    Self(date)
  }
}

impl std::fmt::Display for DayKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0.format(DAY_FORMAT))
  }
}

/// ---------------------------------------------------------------------------
/// Writes
/// ---------------------------------------------------------------------------

/// Merge-add burnt kcal into the bucket for `at`'s day
pub async fn record_burn(
  store: &Store,
  user_id: &str,
  at: DateTime<Utc>,
  kcal_delta: i64,
) -> EngineResult<()> {
  if kcal_delta < 0 {
    return Err(EngineError::InvalidRequest(format!(
      "burnt kcal can only grow, got delta {}",
      kcal_delta
    )));
  }
  if kcal_delta == 0 {
    return Ok(());
  }

  let day = DayKey::from_timestamp(at);
  store
    .bounded(
      "record burn",
      sqlx::query(
        r#"
        INSERT INTO day_buckets (user_id, day_key, burnt_kcal)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(user_id, day_key) DO UPDATE SET
          burnt_kcal = burnt_kcal + excluded.burnt_kcal,
          updated_at = CURRENT_TIMESTAMP
        "#,
      )
      .bind(user_id)
      .bind(day.to_string())
      .bind(kcal_delta)
      .execute(store.pool()),
    )
    .await?;

  tracing::info!(user_id, day = %day, kcal_delta, "Recorded burnt kcal");
  Ok(())
}

/// Merge-add consumed kcal into the bucket for `at`'s day
pub async fn record_intake(
  store: &Store,
  user_id: &str,
  at: DateTime<Utc>,
  kcal: i64,
) -> EngineResult<()> {
  if kcal < 0 {
    return Err(EngineError::InvalidRequest(format!(
      "consumed kcal must be non-negative, got {}",
      kcal
    )));
  }

  let day = DayKey::from_timestamp(at);
  store
    .bounded(
      "record intake",
      sqlx::query(
        r#"
        INSERT INTO day_buckets (user_id, day_key, consumed_kcal)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(user_id, day_key) DO UPDATE SET
          consumed_kcal = consumed_kcal + excluded.consumed_kcal,
          updated_at = CURRENT_TIMESTAMP
        "#,
      )
      .bind(user_id)
      .bind(day.to_string())
      .bind(kcal)
      .execute(store.pool()),
    )
    .await?;

  tracing::info!(user_id, day = %day, kcal, "Recorded consumed kcal");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Reads
/// ---------------------------------------------------------------------------

pub async fn list_buckets(store: &Store, user_id: &str) -> EngineResult<Vec<DayBucket>> {
  store
    .bounded(
      "list buckets",
      sqlx::query_as::<_, DayBucket>(
        r#"
        SELECT user_id, day_key, consumed_kcal, burnt_kcal
        FROM day_buckets
        WHERE user_id = ?1
        ORDER BY day_key
        "#,
      )
      .bind(user_id)
      .fetch_all(store.pool()),
    )
    .await
}

/// Balance for the day containing `as_of`. Missing bucket or target read as 0.
pub async fn get_balance(
  store: &Store,
  user_id: &str,
  as_of: DateTime<Utc>,
) -> EngineResult<DailyBalance> {
  let day = DayKey::from_timestamp(as_of).to_string();

  let (consumed_kcal, burnt_kcal): (i64, i64) = store
    .bounded(
      "read day bucket",
      sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(consumed_kcal), 0), COALESCE(SUM(burnt_kcal), 0)
        FROM day_buckets
        WHERE user_id = ?1 AND substr(day_key, 1, 10) = ?2
        "#,
      )
      .bind(user_id)
      .bind(&day)
      .fetch_one(store.pool()),
    )
    .await?;

  let kcal_target: Option<Option<i64>> = store
    .bounded(
      "read kcal target",
      sqlx::query_scalar("SELECT kcal_target FROM users WHERE user_id = ?1")
        .bind(user_id)
        .fetch_optional(store.pool()),
    )
    .await?;

  Ok(DailyBalance {
    consumed_kcal,
    burnt_kcal,
    kcal_target: kcal_target.flatten().unwrap_or(0),
  })
}

/// ---------------------------------------------------------------------------
/// Maintenance
/// ---------------------------------------------------------------------------

/// Delete every bucket dated before `day`. Keys that are not dates are left alone.
pub async fn prune_before(store: &Store, day: DayKey) -> EngineResult<u64> {
  let keys: Vec<(String, String)> = store
    .bounded(
      "list bucket keys",
      sqlx::query_as("SELECT user_id, day_key FROM day_buckets").fetch_all(store.pool()),
    )
    .await?;

  let mut removed = 0;
  for (user_id, day_key) in keys {
    let Some(key_day) = DayKey::parse(&day_key) else {
      tracing::debug!(user_id = %user_id, day_key = %day_key, "Skipping non-date bucket");
      continue;
    };
    if key_day >= day {
      continue;
    }

    let result = store
      .bounded(
        "delete bucket",
        sqlx::query("DELETE FROM day_buckets WHERE user_id = ?1 AND day_key = ?2")
          .bind(&user_id)
          .bind(&day_key)
          .execute(store.pool()),
      )
      .await?;
    removed += result.rows_affected();
  }

  tracing::info!(before = %day, removed, "Pruned old day buckets");
  Ok(removed)
}

/// Fold timestamp-keyed buckets into their `YYYY-MM-DD` bucket
pub async fn normalize_legacy_keys(store: &Store) -> EngineResult<u64> {
  let rows: Vec<DayBucket> = store
    .bounded(
      "list legacy buckets",
      sqlx::query_as::<_, DayBucket>(
        "SELECT user_id, day_key, consumed_kcal, burnt_kcal FROM day_buckets",
      )
      .fetch_all(store.pool()),
    )
    .await?;

  let mut migrated = 0;
  for bucket in rows.into_iter().filter(|b| !DayKey::is_canonical(&b.day_key)) {
    let Some(day) = DayKey::parse(&bucket.day_key) else {
      continue;
    };

    let mut tx = store.bounded("begin migration", store.pool().begin()).await?;

    store
      .bounded(
        "merge legacy bucket",
        sqlx::query(
          r#"
          INSERT INTO day_buckets (user_id, day_key, consumed_kcal, burnt_kcal)
          VALUES (?1, ?2, ?3, ?4)
          ON CONFLICT(user_id, day_key) DO UPDATE SET
            consumed_kcal = consumed_kcal + excluded.consumed_kcal,
            burnt_kcal = burnt_kcal + excluded.burnt_kcal,
            updated_at = CURRENT_TIMESTAMP
          "#,
        )
        .bind(&bucket.user_id)
        .bind(day.to_string())
        .bind(bucket.consumed_kcal)
        .bind(bucket.burnt_kcal)
        .execute(&mut *tx),
      )
      .await?;

    store
      .bounded(
        "drop legacy bucket",
        sqlx::query("DELETE FROM day_buckets WHERE user_id = ?1 AND day_key = ?2")
          .bind(&bucket.user_id)
          .bind(&bucket.day_key)
          .execute(&mut *tx),
      )
      .await?;

    store.bounded("commit migration", tx.commit()).await?;
    migrated += 1;
  }

  if migrated > 0 {
    tracing::info!(migrated, "Migrated legacy day bucket keys");
  }
  Ok(migrated)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{datetime_at, seed_test_user, setup_test_store};

  #[test]
  fn test_day_key_formats() {
    let at = datetime_at(2025, 5, 28, 20, 56, 45);
    assert_eq!(DayKey::from_timestamp(at).to_string(), "2025-05-28");

    assert_eq!(DayKey::parse("2025-05-28"), Some(DayKey::from_timestamp(at)));
    assert_eq!(DayKey::parse("2025-05-28T20:56:45"), Some(DayKey::from_timestamp(at)));
    assert_eq!(DayKey::parse("nutrients"), None);

    assert!(DayKey::is_canonical("2025-05-28"));
    assert!(!DayKey::is_canonical("2025-05-28T20:56:45"));
  }

  #[tokio::test]
  async fn test_record_burn_creates_then_accumulates() {
    let store = setup_test_store().await;
    let at = datetime_at(2025, 6, 2, 9, 0, 0);

    record_burn(&store, "u1", at, 123).await.unwrap();
    record_burn(&store, "u1", at, 77).await.unwrap();

    let buckets = list_buckets(&store, "u1").await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].day_key, "2025-06-02");
    assert_eq!(buckets[0].burnt_kcal, 200);
    assert_eq!(buckets[0].consumed_kcal, 0);

    store.close().await;
  }

  #[tokio::test]
  async fn test_concurrent_burns_do_not_lose_updates() {
    let store = setup_test_store().await;
    let at = datetime_at(2025, 6, 2, 9, 0, 0);

    let (a, b) = tokio::join!(
      record_burn(&store, "u1", at, 50),
      record_burn(&store, "u1", at, 30)
    );
    a.unwrap();
    b.unwrap();

    let balance = get_balance(&store, "u1", at).await.unwrap();
    assert_eq!(balance.burnt_kcal, 80);

    store.close().await;
  }

  #[tokio::test]
  async fn test_negative_burn_is_rejected_and_zero_is_no_op() {
    let store = setup_test_store().await;
    let at = datetime_at(2025, 6, 2, 9, 0, 0);

    assert!(matches!(
      record_burn(&store, "u1", at, -5).await,
      Err(EngineError::InvalidRequest(_))
    ));
    record_burn(&store, "u1", at, 0).await.unwrap();
    assert!(list_buckets(&store, "u1").await.unwrap().is_empty());

    store.close().await;
  }

  #[tokio::test]
  async fn test_balance_defaults_to_zero() {
    let store = setup_test_store().await;

    let balance = get_balance(&store, "nobody", Utc::now()).await.unwrap();
    assert_eq!(balance, DailyBalance::default());

    store.close().await;
  }

  #[tokio::test]
  async fn test_balance_reads_target_and_today_only() {
    let store = setup_test_store().await;
    seed_test_user(&store, "u1", Some(2000)).await;

    let today = datetime_at(2025, 6, 2, 12, 0, 0);
    let yesterday = datetime_at(2025, 6, 1, 12, 0, 0);
    record_intake(&store, "u1", today, 1500).await.unwrap();
    record_burn(&store, "u1", today, 123).await.unwrap();
    record_burn(&store, "u1", yesterday, 999).await.unwrap();

    let balance = get_balance(&store, "u1", today).await.unwrap();
    assert_eq!(
      balance,
      DailyBalance {
        consumed_kcal: 1500,
        burnt_kcal: 123,
        kcal_target: 2000
      }
    );

    store.close().await;
  }

  #[tokio::test]
  async fn test_balance_matches_legacy_timestamp_bucket() {
    let store = setup_test_store().await;
    sqlx::query("INSERT INTO day_buckets (user_id, day_key, consumed_kcal, burnt_kcal) VALUES ('u1', '2025-06-02T08:15:00', 400, 60)")
      .execute(store.pool())
      .await
      .unwrap();

    let balance = get_balance(&store, "u1", datetime_at(2025, 6, 2, 18, 0, 0)).await.unwrap();
    assert_eq!(balance.consumed_kcal, 400);
    assert_eq!(balance.burnt_kcal, 60);

    store.close().await;
  }

  #[tokio::test]
  async fn test_normalize_legacy_keys_merges_into_canonical_bucket() {
    let store = setup_test_store().await;
    let at = datetime_at(2025, 6, 2, 18, 0, 0);
    record_burn(&store, "u1", at, 100).await.unwrap();
    sqlx::query("INSERT INTO day_buckets (user_id, day_key, consumed_kcal, burnt_kcal) VALUES ('u1', '2025-06-02T08:15:00', 400, 60)")
      .execute(store.pool())
      .await
      .unwrap();

    let migrated = normalize_legacy_keys(&store).await.unwrap();
    assert_eq!(migrated, 1);

    let buckets = list_buckets(&store, "u1").await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].day_key, "2025-06-02");
    assert_eq!(buckets[0].burnt_kcal, 160);
    assert_eq!(buckets[0].consumed_kcal, 400);

    // Second run has nothing left to do
    assert_eq!(normalize_legacy_keys(&store).await.unwrap(), 0);

    store.close().await;
  }

  #[tokio::test]
  async fn test_prune_before_removes_old_buckets_only() {
    let store = setup_test_store().await;
    record_burn(&store, "u1", datetime_at(2025, 5, 30, 9, 0, 0), 10).await.unwrap();
    record_burn(&store, "u2", datetime_at(2025, 6, 1, 9, 0, 0), 10).await.unwrap();
    record_burn(&store, "u1", datetime_at(2025, 6, 2, 9, 0, 0), 10).await.unwrap();
    sqlx::query("INSERT INTO day_buckets (user_id, day_key) VALUES ('u1', '2025-05-01T07:00:00'), ('u1', 'notes')")
      .execute(store.pool())
      .await
      .unwrap();

    let today = DayKey::from_timestamp(datetime_at(2025, 6, 2, 0, 0, 0));
    let removed = prune_before(&store, today).await.unwrap();
    assert_eq!(removed, 3);

    let remaining: Vec<String> = list_buckets(&store, "u1")
      .await
      .unwrap()
      .into_iter()
      .map(|b| b.day_key)
      .collect();
    assert_eq!(remaining, vec!["2025-06-02".to_string(), "notes".to_string()]);

    store.close().await;
  }
}
