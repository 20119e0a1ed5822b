use chrono::{DateTime, Utc};

use crate::db::AppState;
use crate::error::{EngineError, EngineResult};
use crate::estimator::EstimatorError;
use crate::feed::{Handled, Outcome};
use crate::ledger;
use crate::models::{ProfileSnapshot, UserProfile};
use crate::users;

/// Estimate the kcal of a described activity and add them to the day's burn
pub async fn activity_logged(
  state: &AppState,
  user_id: &str,
  description: &str,
  at: DateTime<Utc>,
) -> EngineResult<Handled> {
  let estimator = state
    .estimator
    .as_ref()
    .ok_or(EngineError::Estimator(EstimatorError::NotConfigured))?;

  if description.trim().is_empty() {
    return Err(EngineError::InvalidRequest("activity description is empty".into()));
  }

  // Physical data sharpens the estimate but is optional
  let profile = users::find_user(&state.store, user_id)
    .await?
    .and_then(|user| UserProfile::from_snapshot(&ProfileSnapshot::from_record(&user)).ok());

  let kcal = estimator.estimate_kcal(description, profile.as_ref()).await?;
  ledger::record_burn(&state.store, user_id, at, kcal).await?;

  tracing::info!(user_id, kcal, "Recorded logged activity");

  Ok(Handled::done(Outcome::ActivityRecorded {
    user_id: user_id.to_string(),
    kcal,
  }))
}

/// Add the kcal of a logged meal to the day's intake
pub async fn meal_logged(
  state: &AppState,
  user_id: &str,
  kcal: i64,
  at: DateTime<Utc>,
) -> EngineResult<Handled> {
  ledger::record_intake(&state.store, user_id, at, kcal).await?;

  Ok(Handled::done(Outcome::IntakeRecorded {
    user_id: user_id.to_string(),
    kcal,
  }))
}
