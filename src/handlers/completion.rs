use crate::db::AppState;
use crate::error::{EngineError, EngineResult};
use crate::feed::{ChangeEvent, Handled, Outcome};
use crate::models::ProfileSnapshot;
use crate::plan;
use crate::users;

/// Mark one plan slot completed.
///
/// The write is conditional on the plan not having changed since it was read.
/// A successful write emits a profile update so the completion is credited.
pub async fn exercise_completed(
  state: &AppState,
  user_id: &str,
  slot: usize,
) -> EngineResult<Handled> {
  let user = users::load_user(&state.store, user_id).await?;
  let current = user.exercise_plan_string.clone().unwrap_or_default();
  if current.trim().is_empty() {
    return Err(EngineError::InvalidRequest(format!(
      "user {} has no exercise plan",
      user_id
    )));
  }

  let unchanged = || {
    Handled::done(Outcome::ExerciseCompleted {
      user_id: user_id.to_string(),
      slot,
      changed: false,
    })
  };

  match plan::decode_slots(&current).into_iter().nth(slot) {
    Some(Ok(entry)) if entry.is_completed() => {
      tracing::debug!(user_id, slot, "Exercise already completed");
      return Ok(unchanged());
    }
    Some(Err(e)) => return Err(e),
    _ => {}
  }

  let updated = plan::mark_completed(&current, slot)?;
  if !users::swap_plan(&state.store, user_id, &current, &updated).await? {
    tracing::warn!(user_id, slot, "Plan changed concurrently, completion not applied");
    return Ok(unchanged());
  }

  tracing::info!(user_id, slot, weekday = %plan::weekday_for_slot(slot), "Marked exercise completed");

  let before = ProfileSnapshot::from_record(&user);
  let mut after = before.clone();
  after
    .0
    .insert("exercise_plan_string".into(), serde_json::Value::String(updated));

  Ok(
    Handled::done(Outcome::ExerciseCompleted {
      user_id: user_id.to_string(),
      slot,
      changed: true,
    })
    .then(ChangeEvent::ProfileUpdated {
      user_id: user_id.to_string(),
      before,
      after,
      at: None,
    }),
  )
}
