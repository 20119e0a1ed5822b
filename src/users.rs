//! User profile records: creation, form updates and plan writes

use chrono::Utc;

use crate::db::Store;
use crate::error::{EngineError, EngineResult};
use crate::models::{ProfileForm, ProfileSnapshot, UserRecord};

const SELECT_USER: &str = r#"
  SELECT
    user_id, email, name, age, height, weight, sex, target,
    kcal_target, exercise_plan_string, created_at
  FROM users
  WHERE user_id = ?1
"#;

/// Create the record for a newly registered user. Returns false if it already existed.
pub async fn create_user(
  store: &Store,
  user_id: &str,
  email: Option<&str>,
  name: Option<&str>,
) -> EngineResult<bool> {
  let result = store
    .bounded(
      "create user",
      sqlx::query(
        r#"
        INSERT INTO users (user_id, email, name, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ON CONFLICT(user_id) DO NOTHING
        "#,
      )
      .bind(user_id)
      .bind(email)
      .bind(name)
      .bind(Utc::now())
      .execute(store.pool()),
    )
    .await?;

  Ok(result.rows_affected() == 1)
}

pub async fn find_user(store: &Store, user_id: &str) -> EngineResult<Option<UserRecord>> {
  store
    .bounded(
      "load user",
      sqlx::query_as::<_, UserRecord>(SELECT_USER)
        .bind(user_id)
        .fetch_optional(store.pool()),
    )
    .await
}

pub async fn load_user(store: &Store, user_id: &str) -> EngineResult<UserRecord> {
  find_user(store, user_id)
    .await?
    .ok_or_else(|| EngineError::NotFound(format!("user {}", user_id)))
}

pub async fn load_snapshot(store: &Store, user_id: &str) -> EngineResult<ProfileSnapshot> {
  Ok(ProfileSnapshot::from_record(&load_user(store, user_id).await?))
}

/// Write the plan form fields and return the before/after snapshots
pub async fn save_profile_form(
  store: &Store,
  user_id: &str,
  form: &ProfileForm,
) -> EngineResult<(ProfileSnapshot, ProfileSnapshot)> {
  let before = load_snapshot(store, user_id).await?;

  store
    .bounded(
      "save profile",
      sqlx::query(
        r#"
        UPDATE users SET
          age = ?1,
          height = ?2,
          weight = ?3,
          sex = ?4,
          target = ?5,
          updated_at = CURRENT_TIMESTAMP
        WHERE user_id = ?6
        "#,
      )
      .bind(form.age)
      .bind(form.height)
      .bind(form.weight)
      .bind(form.sex)
      .bind(form.target.trim())
      .bind(user_id)
      .execute(store.pool()),
    )
    .await?;

  let after = load_snapshot(store, user_id).await?;
  Ok((before, after))
}

/// Store a freshly generated plan together with its kcal target
pub async fn save_plan(
  store: &Store,
  user_id: &str,
  plan: &str,
  kcal_target: i64,
) -> EngineResult<()> {
  let result = store
    .bounded(
      "save plan",
      sqlx::query(
        r#"
        UPDATE users SET
          exercise_plan_string = ?1,
          kcal_target = ?2,
          updated_at = CURRENT_TIMESTAMP
        WHERE user_id = ?3
        "#,
      )
      .bind(plan)
      .bind(kcal_target)
      .bind(user_id)
      .execute(store.pool()),
    )
    .await?;

  if result.rows_affected() == 0 {
    return Err(EngineError::NotFound(format!("user {}", user_id)));
  }
  Ok(())
}

/// Replace the plan only if it still equals `expected`. Returns false when
/// another writer changed it first.
pub async fn swap_plan(
  store: &Store,
  user_id: &str,
  expected: &str,
  replacement: &str,
) -> EngineResult<bool> {
  let result = store
    .bounded(
      "swap plan",
      sqlx::query(
        r#"
        UPDATE users SET
          exercise_plan_string = ?1,
          updated_at = CURRENT_TIMESTAMP
        WHERE user_id = ?2 AND exercise_plan_string = ?3
        "#,
      )
      .bind(replacement)
      .bind(user_id)
      .bind(expected)
      .execute(store.pool()),
    )
    .await?;

  Ok(result.rows_affected() == 1)
}
