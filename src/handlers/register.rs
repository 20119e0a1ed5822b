use crate::db::AppState;
use crate::error::{EngineError, EngineResult};
use crate::feed::{Handled, Outcome};
use crate::users;

/// New account: create the user record. Replayed events are harmless.
pub async fn user_created(
  state: &AppState,
  user_id: &str,
  email: Option<&str>,
  name: Option<&str>,
) -> EngineResult<Handled> {
  if user_id.trim().is_empty() {
    return Err(EngineError::InvalidRequest("user_id is empty".into()));
  }

  let created = users::create_user(&state.store, user_id, email, name).await?;
  if created {
    tracing::info!(user_id, "Created user record");
  } else {
    tracing::debug!(user_id, "User record already exists");
  }

  Ok(Handled::done(Outcome::UserCreated {
    user_id: user_id.to_string(),
    created,
  }))
}
